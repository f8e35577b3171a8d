use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use keyward_application::RoleError;
use keyward_core::AppError;
use serde::Serialize;
use tracing::error;

/// API error payload.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_object: Option<String>,
}

/// HTTP API error wrapper around application and role errors.
#[derive(Debug)]
pub enum ApiError {
    App(AppError),
    Role(RoleError),
}

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self::App(value)
    }
}

impl From<RoleError> for ApiError {
    fn from(value: RoleError) -> Self {
        Self::Role(value)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::App(error) => app_error_status(error),
            Self::Role(error) => role_error_status(error),
        }
    }
}

fn app_error_status(error: &AppError) -> StatusCode {
    match error {
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Conflict(_) => StatusCode::CONFLICT,
        AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn role_error_status(error: &RoleError) -> StatusCode {
    match error {
        error if error.is_input_error() => StatusCode::BAD_REQUEST,
        RoleError::RoleNotFound(_) => StatusCode::NOT_FOUND,
        RoleError::ConcurrentWrite(_) => StatusCode::CONFLICT,
        RoleError::RemoteGroupOperationFailed { .. }
        | RoleError::RemotePermissionTargetOperationFailed { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = %status, error = %self, "request failed");
        }

        let remote_object = match &self {
            Self::Role(error) => error.remote_object().map(str::to_owned),
            Self::App(_) => None,
        };
        let payload = Json(ErrorResponse {
            message: self.to_string(),
            remote_object,
        });

        (status, payload).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::App(error) => write!(formatter, "{error}"),
            Self::Role(error) => write!(formatter, "{error}"),
        }
    }
}

/// Standard API result type.
pub type ApiResult<T> = Result<T, ApiError>;
