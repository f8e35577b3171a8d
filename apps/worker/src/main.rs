//! Keyward repair worker runtime.
//!
//! Periodically finishes role reconciliations that were interrupted
//! between the remote calls and the final record commit.

#![forbid(unsafe_code)]

use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use keyward_application::{AuthorizationClient, RoleRecordRepository, RoleService};
use keyward_core::{AppError, AppResult};
use keyward_domain::{DEFAULT_REMOTE_NAME_PREFIX, NamingStrategy};
use keyward_infrastructure::{
    ArtifactoryApiVersion, ArtifactoryAuthorizationClient, ArtifactoryClientConfig,
    PostgresRoleRecordRepository, RedisRoleRecordRepository,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Debug, Clone)]
enum RoleStoreConfig {
    Redis {
        redis_url: String,
        key_prefix: String,
    },
    Postgres {
        database_url: String,
    },
}

#[derive(Debug, Clone)]
struct WorkerConfig {
    role_store: RoleStoreConfig,
    artifactory: ArtifactoryClientConfig,
    remote_name_prefix: String,
    repair_interval_seconds: u64,
    repair_grace_seconds: u64,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let role_service = build_role_service(&config).await?;

    info!(
        repair_interval_seconds = config.repair_interval_seconds,
        repair_grace_seconds = config.repair_grace_seconds,
        artifactory_url = %config.artifactory.base_url,
        api_version = %config.artifactory.api_version,
        "keyward-worker started"
    );

    let interval = Duration::from_secs(config.repair_interval_seconds);
    loop {
        match role_service.repair_pending_roles().await {
            Ok(report) if report.repaired.is_empty() && report.failed.is_empty() => {}
            Ok(report) => {
                info!(
                    repaired = report.repaired.len(),
                    consistent = report.consistent,
                    deferred = report.deferred.len(),
                    failed = report.failed.len(),
                    "repair pass finished"
                );
                for failure in &report.failed {
                    warn!(
                        role_name = %failure.role_name,
                        error = %failure.message,
                        "role is still pending after repair"
                    );
                }
            }
            Err(error) => {
                warn!(error = %error, "failed to list roles for repair");
            }
        }

        tokio::time::sleep(interval).await;
    }
}

async fn build_role_service(config: &WorkerConfig) -> AppResult<RoleService> {
    let repository: Arc<dyn RoleRecordRepository> = match &config.role_store {
        RoleStoreConfig::Redis {
            redis_url,
            key_prefix,
        } => {
            let client = redis::Client::open(redis_url.as_str()).map_err(|error| {
                AppError::Internal(format!("failed to create redis client: {error}"))
            })?;
            Arc::new(RedisRoleRecordRepository::new(client, key_prefix.as_str()))
        }
        RoleStoreConfig::Postgres { database_url } => {
            let pool = connect_pool(database_url.as_str()).await?;
            Arc::new(PostgresRoleRecordRepository::new(pool))
        }
    };

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;
    let authorization_client: Arc<dyn AuthorizationClient> = Arc::new(
        ArtifactoryAuthorizationClient::new(http_client, config.artifactory.clone())?,
    );
    let naming = NamingStrategy::new(config.remote_name_prefix.as_str())?;

    Ok(
        RoleService::new(repository, authorization_client, naming)
            .with_repair_grace(Duration::from_secs(config.repair_grace_seconds)),
    )
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let role_store = match env::var("ROLE_STORE")
            .unwrap_or_else(|_| "postgres".to_owned())
            .trim()
        {
            "redis" => RoleStoreConfig::Redis {
                redis_url: required_env("REDIS_URL")?,
                key_prefix: env::var("REDIS_KEY_PREFIX")
                    .ok()
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_REMOTE_NAME_PREFIX.to_owned()),
            },
            "postgres" => RoleStoreConfig::Postgres {
                database_url: required_env("DATABASE_URL")?,
            },
            other => {
                return Err(AppError::Validation(format!(
                    "worker ROLE_STORE must be 'redis' or 'postgres', got '{other}'"
                )));
            }
        };

        let base_url = required_env("ARTIFACTORY_URL")?;
        let base_url = Url::parse(base_url.trim())
            .map_err(|error| AppError::Validation(format!("invalid ARTIFACTORY_URL: {error}")))?;
        let api_version = match env::var("ARTIFACTORY_API_VERSION") {
            Ok(value) => ArtifactoryApiVersion::from_str(value.as_str())?,
            Err(_) => ArtifactoryApiVersion::default(),
        };
        let artifactory = ArtifactoryClientConfig {
            base_url,
            bearer_token: required_env("ARTIFACTORY_BEARER_TOKEN")?,
            api_version,
            max_attempts: parse_env_u8("ARTIFACTORY_MAX_ATTEMPTS", 3)?,
            retry_backoff_ms: parse_env_u64("ARTIFACTORY_RETRY_BACKOFF_MS", 200)?,
        };

        let remote_name_prefix = env::var("REMOTE_NAME_PREFIX")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_REMOTE_NAME_PREFIX.to_owned());

        let repair_interval_seconds = parse_env_u64("REPAIR_INTERVAL_SECONDS", 60)?;
        if repair_interval_seconds == 0 {
            return Err(AppError::Validation(
                "REPAIR_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            role_store,
            artifactory,
            remote_name_prefix,
            repair_interval_seconds,
            repair_grace_seconds: parse_env_u64("REPAIR_GRACE_SECONDS", 300)?,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    let value = env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn parse_env_u8(name: &str, default: u8) -> AppResult<u8> {
    match env::var(name) {
        Ok(value) => value.trim().parse::<u8>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.trim().parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
