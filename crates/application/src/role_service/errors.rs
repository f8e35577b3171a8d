use keyward_core::AppError;
use thiserror::Error;

/// Result type returned by role operations.
pub type RoleResult<T> = Result<T, RoleError>;

/// Failures surfaced by role reconciliation.
#[derive(Debug, Error)]
pub enum RoleError {
    /// The request did not name a role.
    #[error("role name is required")]
    MissingRoleName,

    /// The role name is malformed.
    #[error("invalid role name: {0}")]
    InvalidRoleName(String),

    /// No role is stored under the name.
    #[error("role '{0}' was not found")]
    RoleNotFound(String),

    /// The permission target list failed parsing or validation.
    #[error("invalid permission target spec: {0}")]
    InvalidPermissionTargetSpec(String),

    /// A remote group call failed.
    #[error("remote group '{name}' operation failed: {cause}")]
    RemoteGroupOperationFailed {
        /// Remote group name.
        name: String,
        /// Underlying adapter error.
        #[source]
        cause: AppError,
    },

    /// A remote permission target call failed.
    #[error("remote permission target '{name}' operation failed: {cause}")]
    RemotePermissionTargetOperationFailed {
        /// Remote permission target name.
        name: String,
        /// Underlying adapter error.
        #[source]
        cause: AppError,
    },

    /// Writing or deleting the role record failed.
    #[error("failed to persist role '{role_name}': {cause}")]
    RecordPersistFailed {
        /// Role name.
        role_name: String,
        /// Underlying store error.
        #[source]
        cause: AppError,
    },

    /// The record changed while a repair was running; the repair did not commit.
    #[error("role '{0}' was changed by a concurrent write")]
    ConcurrentWrite(String),

    /// Reading role records failed.
    #[error("failed to load role records: {0}")]
    RecordLoadFailed(#[source] AppError),
}

impl RoleError {
    pub(super) fn remote_permission_target(name: &str, cause: AppError) -> Self {
        Self::RemotePermissionTargetOperationFailed {
            name: name.to_owned(),
            cause,
        }
    }

    /// Returns the remote object name for remote failures.
    #[must_use]
    pub fn remote_object(&self) -> Option<&str> {
        match self {
            Self::RemoteGroupOperationFailed { name, .. }
            | Self::RemotePermissionTargetOperationFailed { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    /// Returns whether the failure was caused by caller input.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::MissingRoleName | Self::InvalidRoleName(_) | Self::InvalidPermissionTargetSpec(_)
        )
    }
}
