use std::collections::BTreeMap;

use async_trait::async_trait;
use keyward_application::RoleRecordRepository;
use keyward_core::AppResult;
use keyward_domain::RoleRecord;
use tokio::sync::RwLock;

/// In-memory role record store for local runs and tests.
#[derive(Default)]
pub struct InMemoryRoleRecordRepository {
    records: RwLock<BTreeMap<String, RoleRecord>>,
}

impl InMemoryRoleRecordRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleRecordRepository for InMemoryRoleRecordRepository {
    async fn find_role(&self, role_name: &str) -> AppResult<Option<RoleRecord>> {
        Ok(self.records.read().await.get(role_name).cloned())
    }

    async fn save_role(&self, record: &RoleRecord) -> AppResult<()> {
        self.records
            .write()
            .await
            .insert(record.name().to_string(), record.clone());

        Ok(())
    }

    async fn replace_role_if_revision(
        &self,
        record: &RoleRecord,
        expected_revision: u64,
    ) -> AppResult<bool> {
        let mut records = self.records.write().await;
        let Some(current) = records.get_mut(record.name().as_str()) else {
            return Ok(false);
        };
        if current.revision() != expected_revision {
            return Ok(false);
        }

        *current = record.clone();
        Ok(true)
    }

    async fn delete_role(&self, role_name: &str) -> AppResult<()> {
        self.records.write().await.remove(role_name);
        Ok(())
    }

    async fn list_role_names(&self) -> AppResult<Vec<String>> {
        Ok(self.records.read().await.keys().cloned().collect())
    }
}
