//! Shipyard API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dto;
mod error;
mod fanout;
mod handlers;
mod live_logs;
mod state;

use std::sync::Arc;

use shipyard_application::LogQueryService;
use shipyard_core::AppError;
use shipyard_infrastructure::{PostgresLogEventRepository, RedisLogEventBus};
use tracing::{info, warn};

use crate::api_config::{ApiConfig, init_tracing};
use crate::api_router::build_router;
use crate::api_services::{build_redis_client, connect_and_migrate};
use crate::fanout::FanoutGateway;
use crate::live_logs::run_live_log_bridge;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;
    let postgres_pool = connect_and_migrate(config.database_url.as_str()).await?;

    if config.migrate_only {
        info!("migrations applied");
        return Ok(());
    }

    let redis_client = config
        .redis_url
        .as_deref()
        .map(build_redis_client)
        .transpose()?;
    let fanout = FanoutGateway::new(config.fanout_connection_buffer)?;

    match redis_client.clone() {
        Some(client) => {
            let bus =
                RedisLogEventBus::connect(client, config.live_log_channel_prefix.clone()).await?;
            tokio::spawn(run_live_log_bridge(
                bus,
                fanout.clone(),
                config.live_log_channel_prefix.clone(),
            ));
        }
        None => warn!("REDIS_URL is not set; live log push is disabled"),
    }

    let app_state = AppState {
        log_query_service: LogQueryService::new(Arc::new(PostgresLogEventRepository::new(
            postgres_pool.clone(),
        ))),
        fanout,
        postgres_pool: postgres_pool.clone(),
        redis_client,
    };

    let app = build_router(app_state, config.cors_allowed_origin.as_deref())?;
    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "shipyard api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))?;

    postgres_pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
