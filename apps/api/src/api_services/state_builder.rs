use std::sync::Arc;
use std::time::Duration;

use keyward_application::{AuthorizationClient, RoleRecordRepository, RoleService};
use keyward_core::AppError;
use keyward_domain::NamingStrategy;
use keyward_infrastructure::{
    ArtifactoryAuthorizationClient, InMemoryAuthorizationClient, InMemoryRoleRecordRepository,
    PostgresRoleRecordRepository, RedisRoleRecordRepository,
};
use tracing::{info, warn};

use crate::api_config::{ApiConfig, AuthorizationBackendConfig, RoleStoreConfig};
use crate::state::AppState;

use super::database::connect_and_migrate;
use super::redis::build_redis_client;

pub async fn build_app_state(config: &ApiConfig) -> Result<AppState, AppError> {
    let repository = build_role_record_repository(&config.role_store).await?;
    let authorization_client = build_authorization_client(&config.authorization_backend)?;
    let naming = NamingStrategy::new(config.remote_name_prefix.as_str())?;

    Ok(AppState {
        role_service: RoleService::new(repository, authorization_client, naming)
            .with_repair_grace(Duration::from_secs(config.repair_grace_seconds)),
        admin_token: Arc::from(config.admin_token.as_str()),
    })
}

async fn build_role_record_repository(
    role_store: &RoleStoreConfig,
) -> Result<Arc<dyn RoleRecordRepository>, AppError> {
    match role_store {
        RoleStoreConfig::Memory => {
            warn!("ROLE_STORE=memory keeps role records only for the life of the process");
            Ok(Arc::new(InMemoryRoleRecordRepository::new()))
        }
        RoleStoreConfig::Redis {
            redis_url,
            key_prefix,
        } => {
            let client = build_redis_client(redis_url.as_str())?;
            info!(key_prefix = %key_prefix, "using redis role store");
            Ok(Arc::new(RedisRoleRecordRepository::new(
                client,
                key_prefix.as_str(),
            )))
        }
        RoleStoreConfig::Postgres { database_url } => {
            let pool = connect_and_migrate(database_url.as_str()).await?;
            info!("using postgres role store");
            Ok(Arc::new(PostgresRoleRecordRepository::new(pool)))
        }
    }
}

fn build_authorization_client(
    backend: &AuthorizationBackendConfig,
) -> Result<Arc<dyn AuthorizationClient>, AppError> {
    match backend {
        AuthorizationBackendConfig::Memory => {
            warn!("AUTHORIZATION_BACKEND=memory does not reach any remote system");
            Ok(Arc::new(InMemoryAuthorizationClient::new()))
        }
        AuthorizationBackendConfig::Artifactory(artifactory) => {
            let http_client = reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .map_err(|error| {
                    AppError::Internal(format!("failed to build HTTP client: {error}"))
                })?;
            let client = ArtifactoryAuthorizationClient::new(http_client, artifactory.clone())?;
            info!(
                base_url = %artifactory.base_url,
                api_version = %client.api_version(),
                "using artifactory authorization backend"
            );
            Ok(Arc::new(client))
        }
    }
}
