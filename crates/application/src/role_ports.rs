mod authorization_client;
mod inputs;
mod repository;

pub use authorization_client::{AuthorizationClient, PermissionTargetDefinition};
pub use inputs::{
    ReconcileSummary, RepairFailure, RepairOutcome, RepairReport, RoleBinding, RoleDeletion,
    RoleSummary, RoleView, SaveRoleInput,
};
pub use repository::RoleRecordRepository;
