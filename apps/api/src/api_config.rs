use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use keyward_core::AppError;
use keyward_domain::DEFAULT_REMOTE_NAME_PREFIX;
use keyward_infrastructure::{ArtifactoryApiVersion, ArtifactoryClientConfig};
use tracing_subscriber::EnvFilter;
use url::Url;

const ADMIN_TOKEN_MIN_LENGTH: usize = 32;

#[derive(Debug, Clone)]
pub enum RoleStoreConfig {
    Memory,
    Redis {
        redis_url: String,
        key_prefix: String,
    },
    Postgres {
        database_url: String,
    },
}

#[derive(Debug, Clone)]
pub enum AuthorizationBackendConfig {
    Memory,
    Artifactory(ArtifactoryClientConfig),
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub api_host: String,
    pub api_port: u16,
    pub admin_token: String,
    pub role_store: RoleStoreConfig,
    pub authorization_backend: AuthorizationBackendConfig,
    pub remote_name_prefix: String,
    pub repair_grace_seconds: u64,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = parse_env("API_PORT", 3001_u16)?;

        let admin_token = required_non_empty_env("API_ADMIN_TOKEN")?;
        if admin_token.len() < ADMIN_TOKEN_MIN_LENGTH {
            return Err(AppError::Validation(format!(
                "API_ADMIN_TOKEN must be at least {ADMIN_TOKEN_MIN_LENGTH} characters"
            )));
        }

        let remote_name_prefix = env::var("REMOTE_NAME_PREFIX")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_REMOTE_NAME_PREFIX.to_owned());

        Ok(Self {
            migrate_only,
            api_host,
            api_port,
            admin_token,
            role_store: load_role_store()?,
            authorization_backend: load_authorization_backend()?,
            remote_name_prefix,
            repair_grace_seconds: parse_env("REPAIR_GRACE_SECONDS", 300_u64)?,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

fn load_role_store() -> Result<RoleStoreConfig, AppError> {
    match env::var("ROLE_STORE")
        .unwrap_or_else(|_| "memory".to_owned())
        .trim()
    {
        "memory" => Ok(RoleStoreConfig::Memory),
        "redis" => Ok(RoleStoreConfig::Redis {
            redis_url: required_non_empty_env("REDIS_URL")?,
            key_prefix: env::var("REDIS_KEY_PREFIX")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_REMOTE_NAME_PREFIX.to_owned()),
        }),
        "postgres" => Ok(RoleStoreConfig::Postgres {
            database_url: required_non_empty_env("DATABASE_URL")?,
        }),
        other => Err(AppError::Validation(format!(
            "ROLE_STORE must be 'memory', 'redis', or 'postgres', got '{other}'"
        ))),
    }
}

fn load_authorization_backend() -> Result<AuthorizationBackendConfig, AppError> {
    match env::var("AUTHORIZATION_BACKEND")
        .unwrap_or_else(|_| "artifactory".to_owned())
        .trim()
    {
        "memory" => Ok(AuthorizationBackendConfig::Memory),
        "artifactory" => {
            let base_url = required_non_empty_env("ARTIFACTORY_URL")?;
            let base_url = Url::parse(base_url.trim()).map_err(|error| {
                AppError::Validation(format!("invalid ARTIFACTORY_URL: {error}"))
            })?;
            let api_version = env::var("ARTIFACTORY_API_VERSION")
                .ok()
                .map(|value| ArtifactoryApiVersion::from_str(value.as_str()))
                .transpose()?
                .unwrap_or_default();

            Ok(AuthorizationBackendConfig::Artifactory(
                ArtifactoryClientConfig {
                    base_url,
                    bearer_token: required_non_empty_env("ARTIFACTORY_BEARER_TOKEN")?,
                    api_version,
                    max_attempts: parse_env("ARTIFACTORY_MAX_ATTEMPTS", 3_u8)?,
                    retry_backoff_ms: parse_env("ARTIFACTORY_RETRY_BACKOFF_MS", 200_u64)?,
                },
            ))
        }
        other => Err(AppError::Validation(format!(
            "AUTHORIZATION_BACKEND must be 'artifactory' or 'memory', got '{other}'"
        ))),
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn parse_env<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value.trim().parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
