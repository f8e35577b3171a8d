//! Application services and ports.

#![forbid(unsafe_code)]

mod role_ports;
mod role_service;

pub use role_ports::{
    AuthorizationClient, PermissionTargetDefinition, ReconcileSummary, RepairFailure,
    RepairOutcome, RepairReport, RoleBinding, RoleDeletion, RoleRecordRepository, RoleSummary,
    RoleView, SaveRoleInput,
};
pub use role_service::{RoleError, RoleResult, RoleService};
