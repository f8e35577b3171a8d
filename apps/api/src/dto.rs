use keyward_application::{
    ReconcileSummary, RepairOutcome, RepairReport, RoleBinding, RoleSummary, RoleView,
};
use serde::{Deserialize, Serialize};

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Incoming payload for role create-or-update.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveRoleRequest {
    #[serde(default)]
    pub token_ttl: Option<u64>,
    #[serde(default)]
    pub max_ttl: Option<u64>,
    #[serde(default)]
    pub permission_targets: Option<String>,
}

/// Role names listing.
#[derive(Debug, Serialize)]
pub struct RoleListResponse {
    pub roles: Vec<String>,
}

/// Remote changes applied by a reconciliation.
#[derive(Debug, Serialize)]
pub struct ReconcileSummaryResponse {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub deleted: Vec<String>,
}

impl From<ReconcileSummary> for ReconcileSummaryResponse {
    fn from(value: ReconcileSummary) -> Self {
        Self {
            created: value.created,
            updated: value.updated,
            unchanged: value.unchanged,
            deleted: value.deleted,
        }
    }
}

/// Response to a successful create-or-update.
#[derive(Debug, Serialize)]
pub struct SaveRoleResponse {
    pub role_id: String,
    pub role_name: String,
    pub permission_targets: Option<String>,
    pub reconciliation: ReconcileSummaryResponse,
}

impl From<RoleSummary> for SaveRoleResponse {
    fn from(value: RoleSummary) -> Self {
        Self {
            role_id: value.role_id,
            role_name: value.role_name,
            permission_targets: value.permission_targets,
            reconciliation: value.reconciliation.into(),
        }
    }
}

/// API representation of a stored role.
#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub name: String,
    pub role_id: String,
    pub token_ttl: u64,
    pub max_ttl: u64,
    pub permission_targets: Option<String>,
    pub pending: bool,
}

impl From<RoleView> for RoleResponse {
    fn from(value: RoleView) -> Self {
        Self {
            name: value.name,
            role_id: value.role_id,
            token_ttl: value.token_ttl_seconds,
            max_ttl: value.max_ttl_seconds,
            permission_targets: value.permission_targets,
            pending: value.pending,
        }
    }
}

/// Group and lifetimes used to issue credentials for a role.
#[derive(Debug, Serialize)]
pub struct RoleBindingResponse {
    pub role_name: String,
    pub role_id: String,
    pub group_name: String,
    pub token_ttl: u64,
    pub max_ttl: u64,
}

impl From<RoleBinding> for RoleBindingResponse {
    fn from(value: RoleBinding) -> Self {
        Self {
            role_name: value.role_name,
            role_id: value.role_id,
            group_name: value.group_name,
            token_ttl: value.token_ttl.as_secs(),
            max_ttl: value.max_ttl.as_secs(),
        }
    }
}

/// Result of repairing one role.
#[derive(Debug, Serialize)]
pub struct RepairRoleResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<ReconcileSummaryResponse>,
}

impl From<RepairOutcome> for RepairRoleResponse {
    fn from(value: RepairOutcome) -> Self {
        match value {
            RepairOutcome::Repaired(summary) => Self {
                status: "repaired",
                reconciliation: Some(summary.into()),
            },
            RepairOutcome::AlreadyConsistent => Self {
                status: "consistent",
                reconciliation: None,
            },
            RepairOutcome::Deferred => Self {
                status: "deferred",
                reconciliation: None,
            },
        }
    }
}

/// Role that is still pending after a repair pass.
#[derive(Debug, Serialize)]
pub struct RepairFailureResponse {
    pub role_name: String,
    pub message: String,
}

/// Result of a repair pass over every role.
#[derive(Debug, Serialize)]
pub struct RepairReportResponse {
    pub repaired: Vec<String>,
    pub consistent: usize,
    pub deferred: Vec<String>,
    pub failed: Vec<RepairFailureResponse>,
}

impl From<RepairReport> for RepairReportResponse {
    fn from(value: RepairReport) -> Self {
        Self {
            repaired: value.repaired,
            consistent: value.consistent,
            deferred: value.deferred,
            failed: value
                .failed
                .into_iter()
                .map(|failure| RepairFailureResponse {
                    role_name: failure.role_name,
                    message: failure.message,
                })
                .collect(),
        }
    }
}
