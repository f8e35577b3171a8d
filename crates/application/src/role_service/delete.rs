use tracing::{info, warn};

use super::{RoleError, RoleResult, RoleService, parse_role_name};
use crate::role_ports::RoleDeletion;

impl RoleService {
    /// Deletes a role's remote permission targets, its group, then its record.
    ///
    /// Every remote deletion is attempted even after a failure. When any of
    /// them fails the record is kept so a retry can finish the cleanup, and
    /// the first failure is returned.
    pub async fn delete_role(&self, role_name: &str) -> RoleResult<RoleDeletion> {
        let role_name = parse_role_name(role_name)?;
        let Some(record) = self.load_record(&role_name).await? else {
            return Ok(RoleDeletion::NotFound);
        };

        let role_id = record.role_id();
        let mut first_failure: Option<RoleError> = None;

        for target in record.reconciliation_baseline() {
            let name = self.naming.permission_target_name(&role_id, target.key());
            match self.delete_permission_target_if_exists(&name).await {
                Ok(true) => info!(permission_target = %name, "deleted permission target"),
                Ok(false) => {}
                Err(error) => {
                    warn!(
                        permission_target = %name,
                        error = %error,
                        "failed to delete permission target"
                    );
                    if first_failure.is_none() {
                        first_failure = Some(error);
                    }
                }
            }
        }

        let group_name = self.naming.group_name(&role_id);
        if let Err(cause) = self.authorization_client.delete_group(&group_name).await {
            warn!(group = %group_name, error = %cause, "failed to delete group");
            if first_failure.is_none() {
                first_failure = Some(RoleError::RemoteGroupOperationFailed {
                    name: group_name,
                    cause,
                });
            }
        }

        if let Some(error) = first_failure {
            return Err(error);
        }

        self.repository
            .delete_role(role_name.as_str())
            .await
            .map_err(|cause| RoleError::RecordPersistFailed {
                role_name: role_name.to_string(),
                cause,
            })?;

        info!(role_name = %role_name, role_id = %role_id, "role deleted");

        Ok(RoleDeletion::Deleted {
            role_id: role_id.to_string(),
        })
    }
}
