use chrono::{TimeDelta, Utc};
use keyward_domain::{KeyedPermissionTarget, RoleId, RoleName};
use tracing::{info, warn};

use super::{RoleError, RoleResult, RoleService, group_description, parse_role_name};
use crate::role_ports::{RepairFailure, RepairOutcome, RepairReport};

const STRAY_TRACKING_ATTEMPTS: usize = 3;

impl RoleService {
    /// Completes an interrupted reconciliation for one role.
    ///
    /// Re-asserts the group, pushes every desired target, removes stale
    /// targets from the recorded baseline, then commits the record. The
    /// commit only lands if nothing else wrote the record in the meantime;
    /// otherwise the pushed targets are handed to the newer record as stale
    /// candidates and [`RoleError::ConcurrentWrite`] is returned.
    pub async fn repair_role(&self, role_name: &str) -> RoleResult<RepairOutcome> {
        self.repair_role_pending_for(role_name, TimeDelta::zero()).await
    }

    /// Repairs every pending role, continuing past individual failures.
    ///
    /// Roles whose pending reconciliation started less than the repair grace
    /// ago are reported as deferred and left untouched.
    pub async fn repair_pending_roles(&self) -> RoleResult<RepairReport> {
        let grace = TimeDelta::from_std(self.repair_grace).unwrap_or(TimeDelta::MAX);
        let mut report = RepairReport::default();

        for role_name in self.list_roles().await? {
            match self.repair_role_pending_for(role_name.as_str(), grace).await {
                Ok(RepairOutcome::Repaired(_)) => report.repaired.push(role_name),
                Ok(RepairOutcome::AlreadyConsistent) => report.consistent += 1,
                Ok(RepairOutcome::Deferred) => report.deferred.push(role_name),
                Err(RoleError::RoleNotFound(_)) => {}
                Err(RoleError::ConcurrentWrite(_)) => {
                    info!(role_name = %role_name, "role changed during repair, deferring");
                    report.deferred.push(role_name);
                }
                Err(error) => {
                    warn!(role_name = %role_name, error = %error, "role repair failed");
                    report.failed.push(RepairFailure {
                        role_name,
                        message: error.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    async fn repair_role_pending_for(
        &self,
        role_name: &str,
        grace: TimeDelta,
    ) -> RoleResult<RepairOutcome> {
        let role_name = parse_role_name(role_name)?;
        let mut record = self
            .load_record(&role_name)
            .await?
            .ok_or_else(|| RoleError::RoleNotFound(role_name.to_string()))?;

        let Some(pending) = record.pending() else {
            return Ok(RepairOutcome::AlreadyConsistent);
        };
        if Utc::now() - pending.started_at() < grace {
            return Ok(RepairOutcome::Deferred);
        }
        let baseline = pending.previous_permission_targets().to_vec();
        warn!(
            role_name = %role_name,
            started_at = %pending.started_at(),
            "repairing pending role reconciliation"
        );

        let loaded_revision = record.revision();
        let group_name = self.naming.group_name(&record.role_id());
        self.authorization_client
            .create_or_replace_group(&group_name, &group_description(&role_name))
            .await
            .map_err(|cause| RoleError::RemoteGroupOperationFailed {
                name: group_name,
                cause,
            })?;

        let summary = self
            .apply_permission_targets(&record, None, &baseline)
            .await?;

        record.commit(Utc::now());
        if self.replace_if_revision(&record, loaded_revision).await? {
            info!(role_name = %role_name, "pending role reconciliation repaired");
            return Ok(RepairOutcome::Repaired(summary));
        }

        warn!(
            role_name = %role_name,
            revision = loaded_revision,
            "role record changed during repair, not committing"
        );
        self.hand_over_pushed_targets(&role_name, record.role_id(), record.permission_targets())
            .await?;

        Err(RoleError::ConcurrentWrite(role_name.to_string()))
    }

    /// Makes targets pushed by a superseded repair visible to the current
    /// record, so the next write or repair removes the ones it no longer wants.
    async fn hand_over_pushed_targets(
        &self,
        role_name: &RoleName,
        role_id: RoleId,
        pushed: &[KeyedPermissionTarget],
    ) -> RoleResult<()> {
        for _ in 0..STRAY_TRACKING_ATTEMPTS {
            let Some(mut current) = self
                .load_record(role_name)
                .await?
                .filter(|current| current.role_id() == role_id)
            else {
                return self.discard_pushed_objects(role_id, pushed).await;
            };

            let expected_revision = current.revision();
            current.track_stray_targets(pushed, Utc::now());
            if self.replace_if_revision(&current, expected_revision).await? {
                return Ok(());
            }
        }

        warn!(
            role_name = %role_name,
            attempts = STRAY_TRACKING_ATTEMPTS,
            "could not record targets pushed by a superseded repair"
        );
        Ok(())
    }

    /// The role was deleted or recreated under a new id while the repair ran.
    async fn discard_pushed_objects(
        &self,
        role_id: RoleId,
        pushed: &[KeyedPermissionTarget],
    ) -> RoleResult<()> {
        for target in pushed {
            let name = self.naming.permission_target_name(&role_id, target.key());
            self.delete_permission_target_if_exists(&name).await?;
        }
        self.discard_group(&self.naming.group_name(&role_id)).await;
        Ok(())
    }
}
