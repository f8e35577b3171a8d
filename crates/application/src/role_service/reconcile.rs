use std::collections::HashSet;

use chrono::Utc;
use keyward_domain::{
    KeyedPermissionTarget, PermissionTargetKey, RoleId, RoleRecord, RoleTtls,
    key_permission_targets, parse_permission_targets, validate_permission_targets,
};
use tracing::{debug, info, warn};

use super::{
    RoleError, RoleResult, RoleService, group_description, parse_role_name, validation_message,
};
use crate::role_ports::{PermissionTargetDefinition, ReconcileSummary, RoleSummary, SaveRoleInput};

struct DesiredTargets {
    raw: String,
    targets: Vec<KeyedPermissionTarget>,
}

impl RoleService {
    /// Creates or updates a role and converges remote state to its targets.
    ///
    /// The desired record is persisted as pending before remote calls and
    /// committed after they all succeed. A remote failure leaves the record
    /// pending so a later write or repair can finish the work.
    pub async fn save_role(&self, input: SaveRoleInput) -> RoleResult<RoleSummary> {
        let SaveRoleInput {
            name,
            token_ttl_seconds,
            max_ttl_seconds,
            permission_targets,
        } = input;

        let role_name = parse_role_name(name.as_str())?;
        let desired = permission_targets
            .map(|raw| self.parse_desired_targets(raw))
            .transpose()?;
        let ttls = RoleTtls::resolve(token_ttl_seconds, max_ttl_seconds);

        let previous = self.load_record(&role_name).await?;
        let is_new = previous.is_none();
        let now = Utc::now();

        let mut record = match previous {
            Some(record) => record,
            None => {
                let role_id = RoleId::new();
                let group_name = self.naming.group_name(&role_id);
                self.authorization_client
                    .create_or_replace_group(&group_name, &group_description(&role_name))
                    .await
                    .map_err(|cause| RoleError::RemoteGroupOperationFailed {
                        name: group_name.clone(),
                        cause,
                    })?;
                info!(
                    role_name = %role_name,
                    role_id = %role_id,
                    group = %group_name,
                    "created remote group for new role"
                );

                RoleRecord::new(role_name.clone(), role_id, ttls, now)
            }
        };
        record.set_ttls(ttls, now);

        let known = record
            .committed_permission_targets()
            .map(<[KeyedPermissionTarget]>::to_vec);
        let (targets, raw) = match desired {
            Some(desired) => (desired.targets, Some(desired.raw)),
            None if record.is_pending() => (
                record.permission_targets().to_vec(),
                record.raw_permission_targets().map(str::to_owned),
            ),
            None => {
                self.persist_or_discard(&record, is_new).await?;
                return Ok(role_summary(&record, ReconcileSummary::default()));
            }
        };

        record.begin_reconciliation(targets, raw, now);
        self.persist_or_discard(&record, is_new).await?;

        let baseline = record
            .pending()
            .map(|pending| pending.previous_permission_targets().to_vec())
            .unwrap_or_default();
        let summary = self
            .apply_permission_targets(&record, known.as_deref(), &baseline)
            .await?;

        let pending_revision = record.revision();
        record.commit(Utc::now());
        if !self.replace_if_revision(&record, pending_revision).await? {
            warn!(
                role_name = %role_name,
                "role record changed before commit, leaving the stored record for repair"
            );
        }

        info!(
            role_name = %role_name,
            role_id = %record.role_id(),
            created = summary.created.len(),
            updated = summary.updated.len(),
            deleted = summary.deleted.len(),
            "role reconciled"
        );

        Ok(role_summary(&record, summary))
    }

    fn parse_desired_targets(&self, raw: String) -> RoleResult<DesiredTargets> {
        let invalid = |error| RoleError::InvalidPermissionTargetSpec(validation_message(error));

        let inputs = parse_permission_targets(raw.as_str()).map_err(invalid)?;
        let specs = validate_permission_targets(inputs).map_err(invalid)?;
        for (index, spec) in specs.iter().enumerate() {
            self.authorization_client
                .check_compatibility(spec)
                .map_err(|error| {
                    RoleError::InvalidPermissionTargetSpec(format!(
                        "permission target #{index}: {}",
                        validation_message(error)
                    ))
                })?;
        }

        Ok(DesiredTargets {
            raw,
            targets: key_permission_targets(specs),
        })
    }

    async fn persist_or_discard(&self, record: &RoleRecord, is_new: bool) -> RoleResult<()> {
        let result = self.persist(record).await;
        if result.is_err() && is_new {
            self.discard_group(&self.naming.group_name(&record.role_id()))
                .await;
        }

        result
    }

    /// Pushes desired targets in order, then removes stale baseline targets.
    ///
    /// `known` holds the targets confirmed remotely by the last commit; when
    /// absent every existing target is pushed again.
    pub(super) async fn apply_permission_targets(
        &self,
        record: &RoleRecord,
        known: Option<&[KeyedPermissionTarget]>,
        baseline: &[KeyedPermissionTarget],
    ) -> RoleResult<ReconcileSummary> {
        let role_id = record.role_id();
        let group_name = self.naming.group_name(&role_id);
        let mut summary = ReconcileSummary::default();

        for target in record.permission_targets() {
            let name = self.naming.permission_target_name(&role_id, target.key());
            let remote_error = |cause| RoleError::remote_permission_target(&name, cause);

            let exists = self
                .authorization_client
                .permission_target_exists(&name)
                .await
                .map_err(remote_error)?;
            let unchanged = known.is_some_and(|known| known.contains(target));

            if exists && unchanged {
                debug!(permission_target = %name, "permission target unchanged");
                summary.unchanged.push(name);
                continue;
            }

            let definition = PermissionTargetDefinition {
                name: name.clone(),
                group_name: group_name.clone(),
                spec: target.spec().clone(),
            };
            if exists {
                self.authorization_client
                    .update_permission_target(&definition)
                    .await
                    .map_err(remote_error)?;
                info!(permission_target = %name, "updated permission target");
                summary.updated.push(name);
            } else {
                self.authorization_client
                    .create_permission_target(&definition)
                    .await
                    .map_err(remote_error)?;
                info!(permission_target = %name, "created permission target");
                summary.created.push(name);
            }
        }

        let desired_keys: HashSet<&PermissionTargetKey> = record
            .permission_targets()
            .iter()
            .map(KeyedPermissionTarget::key)
            .collect();
        for stale in baseline
            .iter()
            .filter(|target| !desired_keys.contains(target.key()))
        {
            let name = self.naming.permission_target_name(&role_id, stale.key());
            if self.delete_permission_target_if_exists(&name).await? {
                info!(permission_target = %name, "deleted stale permission target");
                summary.deleted.push(name);
            } else {
                warn!(permission_target = %name, "stale permission target already absent");
            }
        }

        Ok(summary)
    }
}

fn role_summary(record: &RoleRecord, reconciliation: ReconcileSummary) -> RoleSummary {
    RoleSummary {
        role_id: record.role_id().to_string(),
        role_name: record.name().to_string(),
        permission_targets: record.raw_permission_targets().map(str::to_owned),
        reconciliation,
    }
}
