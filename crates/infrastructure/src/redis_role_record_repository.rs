//! Redis-backed role record repository.

use async_trait::async_trait;
use keyward_application::RoleRecordRepository;
use keyward_core::{AppError, AppResult};
use keyward_domain::RoleRecord;
use redis::{AsyncCommands, Script};

const SAVE_ROLE_SCRIPT: &str = r#"
redis.call('SET', KEYS[1], ARGV[1])
redis.call('SADD', KEYS[2], ARGV[2])
return 1
"#;

const REPLACE_ROLE_IF_REVISION_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
  return 0
end
local revision = cjson.decode(current)['revision'] or 0
if revision ~= tonumber(ARGV[3]) then
  return 0
end
redis.call('SET', KEYS[1], ARGV[1])
redis.call('SADD', KEYS[2], ARGV[2])
return 1
"#;

const DELETE_ROLE_SCRIPT: &str = r#"
redis.call('DEL', KEYS[1])
redis.call('SREM', KEYS[2], ARGV[1])
return 1
"#;

/// Redis implementation of the role record repository port.
///
/// Records are JSON documents at `{prefix}:role:{name}`; names are indexed in
/// the set `{prefix}:roles`. Both keys change together in one script call.
#[derive(Clone)]
pub struct RedisRoleRecordRepository {
    client: redis::Client,
    key_prefix: String,
}

impl RedisRoleRecordRepository {
    /// Creates a repository with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn record_key(&self, role_name: &str) -> String {
        format!("{}:role:{role_name}", self.key_prefix)
    }

    fn index_key(&self) -> String {
        format!("{}:roles", self.key_prefix)
    }

    fn encode(record: &RoleRecord) -> AppResult<String> {
        serde_json::to_string(record).map_err(|error| {
            AppError::Internal(format!(
                "failed to serialize role record '{}': {error}",
                record.name()
            ))
        })
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl RoleRecordRepository for RedisRoleRecordRepository {
    async fn find_role(&self, role_name: &str) -> AppResult<Option<RoleRecord>> {
        let mut connection = self.connection().await?;
        let encoded: Option<String> = connection
            .get(self.record_key(role_name))
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to read role record '{role_name}' from redis: {error}"
                ))
            })?;

        encoded
            .map(|value| {
                serde_json::from_str::<RoleRecord>(value.as_str()).map_err(|error| {
                    AppError::Internal(format!(
                        "invalid role record '{role_name}' stored in redis: {error}"
                    ))
                })
            })
            .transpose()
    }

    async fn save_role(&self, record: &RoleRecord) -> AppResult<()> {
        let role_name = record.name().as_str();
        let encoded = Self::encode(record)?;

        let mut connection = self.connection().await?;
        Script::new(SAVE_ROLE_SCRIPT)
            .key(self.record_key(role_name))
            .key(self.index_key())
            .arg(encoded)
            .arg(role_name)
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to write role record '{role_name}' to redis: {error}"
                ))
            })?;

        Ok(())
    }

    async fn replace_role_if_revision(
        &self,
        record: &RoleRecord,
        expected_revision: u64,
    ) -> AppResult<bool> {
        let role_name = record.name().as_str();
        let encoded = Self::encode(record)?;

        let mut connection = self.connection().await?;
        let replaced = Script::new(REPLACE_ROLE_IF_REVISION_SCRIPT)
            .key(self.record_key(role_name))
            .key(self.index_key())
            .arg(encoded)
            .arg(role_name)
            .arg(expected_revision.to_string())
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to replace role record '{role_name}' in redis: {error}"
                ))
            })?;

        Ok(replaced == 1)
    }

    async fn delete_role(&self, role_name: &str) -> AppResult<()> {
        let mut connection = self.connection().await?;
        Script::new(DELETE_ROLE_SCRIPT)
            .key(self.record_key(role_name))
            .key(self.index_key())
            .arg(role_name)
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to delete role record '{role_name}' from redis: {error}"
                ))
            })?;

        Ok(())
    }

    async fn list_role_names(&self) -> AppResult<Vec<String>> {
        let mut connection = self.connection().await?;
        let mut names: Vec<String> = connection
            .smembers(self.index_key())
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to list role names from redis: {error}"))
            })?;
        names.sort();

        Ok(names)
    }
}
