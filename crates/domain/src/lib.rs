//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod naming;
mod operation;
mod permission_target;
mod role;

pub use naming::{DEFAULT_REMOTE_NAME_PREFIX, NamingStrategy};
pub use operation::Operation;
pub use permission_target::{
    BUILD_INFO_REPOSITORY, DEFAULT_EXCLUDE_PATTERN, DEFAULT_INCLUDE_PATTERN, KeyedPermissionTarget,
    OperationsInput, PermissionScope, PermissionScopeInput, PermissionTargetInput,
    PermissionTargetKey, PermissionTargetSpec, Principal, PrincipalGrant, ScopeKind,
    key_permission_targets, parse_permission_targets, validate_permission_targets,
};
pub use role::{
    DEFAULT_MAX_TTL_SECONDS, DEFAULT_TOKEN_TTL_SECONDS, PendingReconciliation, RoleId, RoleName,
    RoleRecord, RoleTtls,
};
