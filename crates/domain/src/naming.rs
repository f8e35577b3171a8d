use keyward_core::{AppError, AppResult};

use crate::{PermissionTargetKey, RoleId};

/// Prefix used for remote object names when none is configured.
pub const DEFAULT_REMOTE_NAME_PREFIX: &str = "keyward";

/// Derives remote object names from a role's immutable identifier.
///
/// Role ids render as fixed-length hyphenated UUIDs, so the suffix after the
/// id is unambiguous and names of distinct roles never collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingStrategy {
    prefix: String,
}

impl NamingStrategy {
    /// Creates a naming strategy with a validated prefix.
    pub fn new(prefix: impl Into<String>) -> AppResult<Self> {
        let prefix = prefix.into().trim().to_owned();
        if prefix.is_empty() {
            return Err(AppError::Validation(
                "remote name prefix must not be empty".to_owned(),
            ));
        }

        if !prefix
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || matches!(character, '_' | '.'))
        {
            return Err(AppError::Validation(format!(
                "remote name prefix '{prefix}' may only contain letters, digits, '_', and '.'"
            )));
        }

        Ok(Self { prefix })
    }

    /// Returns the remote group name for a role.
    #[must_use]
    pub fn group_name(&self, role_id: &RoleId) -> String {
        format!("{}-{role_id}", self.prefix)
    }

    /// Returns the remote permission target name for one target of a role.
    #[must_use]
    pub fn permission_target_name(&self, role_id: &RoleId, key: &PermissionTargetKey) -> String {
        format!("{}-{role_id}-{key}", self.prefix)
    }
}

impl Default for NamingStrategy {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_REMOTE_NAME_PREFIX.to_owned(),
        }
    }
}
