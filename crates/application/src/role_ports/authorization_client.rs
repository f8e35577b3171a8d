use async_trait::async_trait;

use keyward_core::AppResult;
use keyward_domain::PermissionTargetSpec;

/// Remote permission target as handed to the authorization client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionTargetDefinition {
    /// Derived remote permission target name.
    pub name: String,
    /// Remote group owned by the role.
    pub group_name: String,
    /// Declared scopes and grants.
    pub spec: PermissionTargetSpec,
}

/// Port for the remote authorization system.
///
/// Deletes of absent objects must succeed so retries stay idempotent.
#[async_trait]
pub trait AuthorizationClient: Send + Sync {
    /// Creates a group or replaces an existing group with the same name.
    async fn create_or_replace_group(&self, group_name: &str, description: &str) -> AppResult<()>;

    /// Deletes a group.
    async fn delete_group(&self, group_name: &str) -> AppResult<()>;

    /// Returns whether a permission target exists.
    async fn permission_target_exists(&self, name: &str) -> AppResult<bool>;

    /// Creates a permission target.
    async fn create_permission_target(
        &self,
        definition: &PermissionTargetDefinition,
    ) -> AppResult<()>;

    /// Replaces the content of an existing permission target.
    async fn update_permission_target(
        &self,
        definition: &PermissionTargetDefinition,
    ) -> AppResult<()>;

    /// Deletes a permission target.
    async fn delete_permission_target(&self, name: &str) -> AppResult<()>;

    /// Rejects specs this remote API variant cannot express.
    ///
    /// Runs before any remote mutation.
    fn check_compatibility(&self, spec: &PermissionTargetSpec) -> AppResult<()> {
        let _ = spec;
        Ok(())
    }
}
