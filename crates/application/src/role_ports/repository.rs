use async_trait::async_trait;

use keyward_core::AppResult;
use keyward_domain::RoleRecord;

/// Key/value store port for role records keyed by role name.
///
/// API writes for one role name are serialized by callers. Background
/// repairs race with them and use [`RoleRecordRepository::replace_role_if_revision`].
#[async_trait]
pub trait RoleRecordRepository: Send + Sync {
    /// Returns the record stored under a role name.
    async fn find_role(&self, role_name: &str) -> AppResult<Option<RoleRecord>>;

    /// Creates or replaces the record stored under the record's name.
    async fn save_role(&self, record: &RoleRecord) -> AppResult<()>;

    /// Replaces the stored record only while its revision equals `expected_revision`.
    ///
    /// Returns `false` without writing when the record changed or no longer exists.
    async fn replace_role_if_revision(
        &self,
        record: &RoleRecord,
        expected_revision: u64,
    ) -> AppResult<bool>;

    /// Deletes the record stored under a role name, if any.
    async fn delete_role(&self, role_name: &str) -> AppResult<()>;

    /// Lists stored role names.
    async fn list_role_names(&self) -> AppResult<Vec<String>>;
}
