use super::{RoleError, RoleResult, RoleService, parse_role_name};
use crate::role_ports::{RoleBinding, RoleView};

impl RoleService {
    /// Returns the stored role, or `None` when absent.
    pub async fn read_role(&self, role_name: &str) -> RoleResult<Option<RoleView>> {
        let role_name = parse_role_name(role_name)?;
        let record = self.load_record(&role_name).await?;

        Ok(record.map(|record| {
            let ttls = record.ttls();
            RoleView {
                name: record.name().to_string(),
                role_id: record.role_id().to_string(),
                token_ttl_seconds: ttls.token_ttl.as_secs(),
                max_ttl_seconds: ttls.max_ttl.as_secs(),
                permission_targets: record.raw_permission_targets().map(str::to_owned),
                pending: record.is_pending(),
            }
        }))
    }

    /// Returns stored role names in ascending order.
    pub async fn list_roles(&self) -> RoleResult<Vec<String>> {
        let mut names = self
            .repository
            .list_role_names()
            .await
            .map_err(RoleError::RecordLoadFailed)?;
        names.sort();
        names.dedup();

        Ok(names)
    }

    /// Resolves the group and lifetimes credentials for a role are bound to.
    pub async fn resolve_role_binding(&self, role_name: &str) -> RoleResult<RoleBinding> {
        let role_name = parse_role_name(role_name)?;
        let record = self
            .load_record(&role_name)
            .await?
            .ok_or_else(|| RoleError::RoleNotFound(role_name.to_string()))?;

        let role_id = record.role_id();
        let ttls = record.ttls();
        Ok(RoleBinding {
            role_name: role_name.to_string(),
            role_id: role_id.to_string(),
            group_name: self.naming.group_name(&role_id),
            token_ttl: ttls.token_ttl,
            max_ttl: ttls.max_ttl,
        })
    }
}
