//! Fluxgate admin API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use fluxgate_core::AppError;
use tracing::info;

use crate::api_config::{ApiConfig, RuleStoreConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let postgres_pool = match &config.rule_store {
        RuleStoreConfig::Postgres { database_url } => {
            Some(api_services::connect_and_migrate(database_url).await?)
        }
        RuleStoreConfig::Memory => None,
    };

    if config.migrate_only {
        if postgres_pool.is_none() {
            return Err(AppError::Internal(
                "migrate requires RULE_STORE=postgres".to_owned(),
            ));
        }
        info!("database migrations applied successfully");
        return Ok(());
    }

    let app_state = api_services::build_app_state(postgres_pool, &config)?;
    let app = api_router::build_router(app_state, &config)?;

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, rule_store = config.rule_store.as_str(), "fluxgate-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
