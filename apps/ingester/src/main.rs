//! Shipyard batch ingester: log topic to log store.

#![forbid(unsafe_code)]

mod ingester_config;

use std::sync::Arc;

use shipyard_application::{IngestionSettings, LogIngestionService, TopicDescriptor};
use shipyard_core::{AppError, AppResult};
use shipyard_infrastructure::{
    ConsumerGroupSettings, PostgresLogEventRepository, RedisLogEventBus, RedisStreamConsumer,
    connect_topic_connection,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::ingester_config::{IngesterConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = IngesterConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let redis_client = redis::Client::open(config.redis_url.as_str())
        .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;

    let descriptor = TopicDescriptor::new(config.topic.clone(), config.topic_partitions)?;
    let consumer = RedisStreamConsumer::new(
        connect_topic_connection(redis_client.clone()).await?,
        descriptor,
        ConsumerGroupSettings {
            group: config.consumer_group.clone(),
            consumer_name: config.consumer_name.clone(),
            assignment: config.assignment,
            redelivery_idle: config.redelivery_idle,
        },
    )?;
    consumer.ensure_consumer_groups().await?;

    let mut service = LogIngestionService::new(
        Arc::new(PostgresLogEventRepository::new(pool.clone())),
        IngestionSettings {
            commit_every: config.commit_every,
            event_ids: config.event_ids,
        },
    )?;
    if config.live_logs {
        let bus =
            RedisLogEventBus::connect(redis_client, config.live_log_channel_prefix.clone()).await?;
        service = service.with_event_bus(Arc::new(bus));
    }

    let partitions: Vec<u32> = consumer
        .partitions()
        .iter()
        .map(|partition| partition.index())
        .collect();
    info!(
        consumer_name = %config.consumer_name,
        consumer_group = %config.consumer_group,
        topic = %config.topic,
        partitions = ?partitions,
        batch_size = config.batch_size,
        event_ids = ?config.event_ids,
        live_logs = config.live_logs,
        "shipyard-ingester started"
    );

    let (shutdown_sender, mut shutdown) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(error) => warn!(error = %error, "failed to listen for shutdown signal"),
        }
        let _ = shutdown_sender.send(true);
    });

    while !*shutdown.borrow() {
        let idle = match service.poll_once(&consumer, config.batch_size).await {
            Ok(report) => report.received == 0,
            Err(error) => {
                warn!(
                    consumer_name = %config.consumer_name,
                    error = %error,
                    "failed to fetch log batch"
                );
                true
            }
        };

        if idle {
            tokio::select! {
                _ = tokio::time::sleep(config.poll_interval) => {}
                _ = shutdown.changed() => {}
            }
        }
    }

    pool.close().await;
    info!("shipyard-ingester stopped");
    Ok(())
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Unavailable(format!("failed to connect to database: {error}")))?;

    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&pool)
        .await
        .map_err(|error| AppError::Unavailable(format!("database is not reachable: {error}")))?;

    Ok(pool)
}
