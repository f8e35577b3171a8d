use std::sync::Arc;
use std::time::Duration;

use keyward_core::AppError;
use keyward_domain::{NamingStrategy, RoleName, RoleRecord};
use tracing::warn;

use crate::role_ports::{AuthorizationClient, RoleRecordRepository};

mod delete;
mod errors;
mod queries;
mod reconcile;
mod repair;

#[cfg(test)]
mod tests;

pub use errors::{RoleError, RoleResult};

/// Application service that reconciles roles with the remote authorization system.
///
/// Callers must not run two writes for the same role name concurrently.
/// Repairs may run alongside writes: they skip pending records younger than
/// the repair grace and only commit over the revision they read.
#[derive(Clone)]
pub struct RoleService {
    repository: Arc<dyn RoleRecordRepository>,
    authorization_client: Arc<dyn AuthorizationClient>,
    naming: NamingStrategy,
    repair_grace: Duration,
}

impl RoleService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        repository: Arc<dyn RoleRecordRepository>,
        authorization_client: Arc<dyn AuthorizationClient>,
        naming: NamingStrategy,
    ) -> Self {
        Self {
            repository,
            authorization_client,
            naming,
            repair_grace: Duration::ZERO,
        }
    }

    /// Sets how old a pending reconciliation must be before
    /// [`RoleService::repair_pending_roles`] touches it.
    #[must_use]
    pub fn with_repair_grace(mut self, repair_grace: Duration) -> Self {
        self.repair_grace = repair_grace;
        self
    }

    /// Returns the naming strategy used for remote objects.
    #[must_use]
    pub fn naming(&self) -> &NamingStrategy {
        &self.naming
    }

    async fn load_record(&self, role_name: &RoleName) -> RoleResult<Option<RoleRecord>> {
        self.repository
            .find_role(role_name.as_str())
            .await
            .map_err(RoleError::RecordLoadFailed)
    }

    async fn persist(&self, record: &RoleRecord) -> RoleResult<()> {
        self.repository
            .save_role(record)
            .await
            .map_err(|cause| RoleError::RecordPersistFailed {
                role_name: record.name().to_string(),
                cause,
            })
    }

    async fn replace_if_revision(
        &self,
        record: &RoleRecord,
        expected_revision: u64,
    ) -> RoleResult<bool> {
        self.repository
            .replace_role_if_revision(record, expected_revision)
            .await
            .map_err(|cause| RoleError::RecordPersistFailed {
                role_name: record.name().to_string(),
                cause,
            })
    }

    async fn delete_permission_target_if_exists(&self, name: &str) -> RoleResult<bool> {
        let exists = self
            .authorization_client
            .permission_target_exists(name)
            .await
            .map_err(|cause| RoleError::remote_permission_target(name, cause))?;
        if !exists {
            return Ok(false);
        }

        self.authorization_client
            .delete_permission_target(name)
            .await
            .map_err(|cause| RoleError::remote_permission_target(name, cause))?;

        Ok(true)
    }

    async fn discard_group(&self, group_name: &str) {
        if let Err(error) = self.authorization_client.delete_group(group_name).await {
            warn!(group = group_name, error = %error, "failed to discard group of unsaved role");
        }
    }
}

fn parse_role_name(value: &str) -> RoleResult<RoleName> {
    if value.trim().is_empty() {
        return Err(RoleError::MissingRoleName);
    }

    RoleName::new(value).map_err(|error| RoleError::InvalidRoleName(validation_message(error)))
}

fn group_description(role_name: &RoleName) -> String {
    format!("keyward role '{role_name}'")
}

fn validation_message(error: AppError) -> String {
    match error {
        AppError::Validation(message) => message,
        other => other.to_string(),
    }
}
