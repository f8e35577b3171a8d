use async_trait::async_trait;
use sqlx::PgPool;

use keyward_application::RoleRecordRepository;
use keyward_core::{AppError, AppResult};
use keyward_domain::RoleRecord;


/// PostgreSQL-backed repository for role records.
#[derive(Clone)]
pub struct PostgresRoleRecordRepository {
    pool: PgPool,
}

impl PostgresRoleRecordRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleRecordRepository for PostgresRoleRecordRepository {
    async fn find_role(&self, role_name: &str) -> AppResult<Option<RoleRecord>> {
        let encoded = sqlx::query_scalar::<_, String>(
            r#"
            SELECT record::text
            FROM role_records
            WHERE name = $1
            "#,
        )
        .bind(role_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find role record '{role_name}': {error}"))
        })?;

        encoded
            .map(|value| {
                serde_json::from_str::<RoleRecord>(value.as_str()).map_err(|error| {
                    AppError::Internal(format!(
                        "invalid role record '{role_name}' stored in postgres: {error}"
                    ))
                })
            })
            .transpose()
    }

    async fn save_role(&self, record: &RoleRecord) -> AppResult<()> {
        let role_name = record.name().as_str();
        let encoded = encode(record)?;

        sqlx::query(
            r#"
            INSERT INTO role_records (name, record, updated_at)
            VALUES ($1, $2::jsonb, $3)
            ON CONFLICT (name) DO UPDATE
            SET record = EXCLUDED.record,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(role_name)
        .bind(encoded)
        .bind(record.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to save role record '{role_name}': {error}"))
        })?;

        Ok(())
    }

    async fn replace_role_if_revision(
        &self,
        record: &RoleRecord,
        expected_revision: u64,
    ) -> AppResult<bool> {
        let role_name = record.name().as_str();
        let encoded = encode(record)?;
        let expected_revision = i64::try_from(expected_revision).map_err(|_| {
            AppError::Internal(format!(
                "revision of role record '{role_name}' exceeds the stored range"
            ))
        })?;

        let result = sqlx::query(
            r#"
            UPDATE role_records
            SET record = $2::jsonb,
                updated_at = $3
            WHERE name = $1
              AND COALESCE((record->>'revision')::bigint, 0) = $4
            "#,
        )
        .bind(role_name)
        .bind(encoded)
        .bind(record.updated_at())
        .bind(expected_revision)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to replace role record '{role_name}': {error}"
            ))
        })?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_role(&self, role_name: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM role_records
            WHERE name = $1
            "#,
        )
        .bind(role_name)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to delete role record '{role_name}': {error}"
            ))
        })?;

        Ok(())
    }

    async fn list_role_names(&self) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT name
            FROM role_records
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list role records: {error}")))
    }
}

fn encode(record: &RoleRecord) -> AppResult<String> {
    serde_json::to_string(record).map_err(|error| {
        AppError::Internal(format!(
            "failed to serialize role record '{}': {error}",
            record.name()
        ))
    })
}
