//! Keyward API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use keyward_core::AppError;
use tracing::info;

use crate::api_config::{ApiConfig, RoleStoreConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    if config.migrate_only {
        match &config.role_store {
            RoleStoreConfig::Postgres { database_url } => {
                api_services::connect_and_migrate(database_url.as_str()).await?;
                info!("database migrations applied successfully");
            }
            RoleStoreConfig::Memory | RoleStoreConfig::Redis { .. } => {
                info!("configured role store has no migrations");
            }
        }
        return Ok(());
    }

    let app_state = api_services::build_app_state(&config).await?;
    let app = api_router::build_router(app_state);

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "keyward-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
