use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use keyward_application::{RoleDeletion, RoleError, SaveRoleInput};
use tracing::info;

use crate::dto::{
    RepairReportResponse, RepairRoleResponse, RoleBindingResponse, RoleListResponse,
    RoleResponse, SaveRoleRequest, SaveRoleResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_roles_handler(State(state): State<AppState>) -> ApiResult<Json<RoleListResponse>> {
    let roles = state.role_service.list_roles().await?;

    Ok(Json(RoleListResponse { roles }))
}

pub async fn save_role_handler(
    State(state): State<AppState>,
    Path(role_name): Path<String>,
    Json(payload): Json<SaveRoleRequest>,
) -> ApiResult<Json<SaveRoleResponse>> {
    let summary = state
        .role_service
        .save_role(SaveRoleInput {
            name: role_name,
            token_ttl_seconds: payload.token_ttl,
            max_ttl_seconds: payload.max_ttl,
            permission_targets: payload.permission_targets,
        })
        .await?;

    Ok(Json(SaveRoleResponse::from(summary)))
}

pub async fn read_role_handler(
    State(state): State<AppState>,
    Path(role_name): Path<String>,
) -> ApiResult<Json<RoleResponse>> {
    let role = state
        .role_service
        .read_role(role_name.as_str())
        .await?
        .ok_or(RoleError::RoleNotFound(role_name))?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn delete_role_handler(
    State(state): State<AppState>,
    Path(role_name): Path<String>,
) -> ApiResult<StatusCode> {
    match state.role_service.delete_role(role_name.as_str()).await? {
        RoleDeletion::Deleted { role_id } => {
            info!(role_name = %role_name, role_id = %role_id, "role deleted via api");
        }
        RoleDeletion::NotFound => {
            info!(role_name = %role_name, "delete requested for unknown role");
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn role_binding_handler(
    State(state): State<AppState>,
    Path(role_name): Path<String>,
) -> ApiResult<Json<RoleBindingResponse>> {
    let binding = state
        .role_service
        .resolve_role_binding(role_name.as_str())
        .await?;

    Ok(Json(RoleBindingResponse::from(binding)))
}

pub async fn repair_role_handler(
    State(state): State<AppState>,
    Path(role_name): Path<String>,
) -> ApiResult<Json<RepairRoleResponse>> {
    let outcome = state.role_service.repair_role(role_name.as_str()).await?;

    Ok(Json(RepairRoleResponse::from(outcome)))
}

pub async fn repair_pending_roles_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<RepairReportResponse>> {
    let report = state.role_service.repair_pending_roles().await?;

    Ok(Json(RepairReportResponse::from(report)))
}
