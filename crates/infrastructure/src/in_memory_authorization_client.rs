use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use keyward_application::{AuthorizationClient, PermissionTargetDefinition};
use keyward_core::{AppError, AppResult};
use tokio::sync::RwLock;
use tracing::info;

/// In-memory authorization backend for local runs and tests.
///
/// Mirrors the remote contract: creating an existing target conflicts,
/// updating a missing one is not found, and deletes are idempotent.
#[derive(Default)]
pub struct InMemoryAuthorizationClient {
    groups: RwLock<BTreeMap<String, String>>,
    permission_targets: RwLock<BTreeMap<String, PermissionTargetDefinition>>,
}

impl InMemoryAuthorizationClient {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the names of existing groups.
    pub async fn group_names(&self) -> BTreeSet<String> {
        self.groups.read().await.keys().cloned().collect()
    }

    /// Returns a stored permission target.
    pub async fn permission_target(&self, name: &str) -> Option<PermissionTargetDefinition> {
        self.permission_targets.read().await.get(name).cloned()
    }

    /// Returns the names of existing permission targets.
    pub async fn permission_target_names(&self) -> BTreeSet<String> {
        self.permission_targets.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl AuthorizationClient for InMemoryAuthorizationClient {
    async fn create_or_replace_group(&self, group_name: &str, description: &str) -> AppResult<()> {
        self.groups
            .write()
            .await
            .insert(group_name.to_owned(), description.to_owned());
        info!(group = group_name, "stored in-memory group");

        Ok(())
    }

    async fn delete_group(&self, group_name: &str) -> AppResult<()> {
        self.groups.write().await.remove(group_name);
        Ok(())
    }

    async fn permission_target_exists(&self, name: &str) -> AppResult<bool> {
        Ok(self.permission_targets.read().await.contains_key(name))
    }

    async fn create_permission_target(
        &self,
        definition: &PermissionTargetDefinition,
    ) -> AppResult<()> {
        let mut permission_targets = self.permission_targets.write().await;
        if permission_targets.contains_key(&definition.name) {
            return Err(AppError::Conflict(format!(
                "permission target '{}' already exists",
                definition.name
            )));
        }

        permission_targets.insert(definition.name.clone(), definition.clone());
        Ok(())
    }

    async fn update_permission_target(
        &self,
        definition: &PermissionTargetDefinition,
    ) -> AppResult<()> {
        let mut permission_targets = self.permission_targets.write().await;
        let Some(existing) = permission_targets.get_mut(&definition.name) else {
            return Err(AppError::NotFound(format!(
                "permission target '{}' does not exist",
                definition.name
            )));
        };

        *existing = definition.clone();
        Ok(())
    }

    async fn delete_permission_target(&self, name: &str) -> AppResult<()> {
        self.permission_targets.write().await.remove(name);
        Ok(())
    }
}
