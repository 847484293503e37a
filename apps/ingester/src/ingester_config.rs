use std::env;
use std::str::FromStr;
use std::time::Duration;

use shipyard_application::EventIdStrategy;
use shipyard_core::{AppError, AppResult};
use shipyard_domain::PartitionAssignment;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct IngesterConfig {
    pub database_url: String,
    pub redis_url: String,
    pub topic: String,
    pub topic_partitions: u32,
    pub consumer_group: String,
    pub consumer_name: String,
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub commit_every: usize,
    pub redelivery_idle: Duration,
    pub assignment: Option<PartitionAssignment>,
    pub event_ids: EventIdStrategy,
    pub live_logs: bool,
    pub live_log_channel_prefix: String,
}

impl IngesterConfig {
    pub fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let redis_url = required_env("REDIS_URL")?;
        let topic = optional_env("LOG_TOPIC").unwrap_or_else(|| "container-logs".to_owned());
        let topic_partitions = parse_env("LOG_TOPIC_PARTITIONS", 8_u32)?;
        let consumer_group = optional_env("INGESTER_CONSUMER_GROUP")
            .unwrap_or_else(|| "api-server-logs-consumer".to_owned());
        let consumer_name = optional_env("INGESTER_CONSUMER_NAME")
            .map(|value| value.trim().to_owned())
            .unwrap_or_else(|| format!("ingester-{}", std::process::id()));
        let batch_size = parse_env("INGESTER_BATCH_SIZE", 100_usize)?;
        let poll_interval_ms = parse_env("INGESTER_POLL_INTERVAL_MS", 1000_u64)?;
        let commit_every = parse_env("INGESTER_COMMIT_EVERY", 10_usize)?;
        let redelivery_idle_ms = parse_env("INGESTER_REDELIVERY_IDLE_MS", 30_000_u64)?;
        let assignment = parse_partition_assignment(
            optional_env("INGESTER_PARTITION_COUNT")
                .map(|value| parse_value("INGESTER_PARTITION_COUNT", value.as_str()))
                .transpose()?,
            optional_env("INGESTER_PARTITION_INDEX")
                .map(|value| parse_value("INGESTER_PARTITION_INDEX", value.as_str()))
                .transpose()?,
        )?;
        let event_ids = optional_env("INGESTER_EVENT_IDS")
            .map(|value| EventIdStrategy::parse(value.as_str()))
            .transpose()?
            .unwrap_or(EventIdStrategy::Random);
        let live_logs = parse_env("INGESTER_LIVE_LOGS", true)?;
        let live_log_channel_prefix =
            optional_env("LIVE_LOG_CHANNEL_PREFIX").unwrap_or_else(|| "logs".to_owned());

        for (name, value) in [
            ("LOG_TOPIC_PARTITIONS", u64::from(topic_partitions)),
            ("INGESTER_BATCH_SIZE", batch_size as u64),
            ("INGESTER_POLL_INTERVAL_MS", poll_interval_ms),
            ("INGESTER_COMMIT_EVERY", commit_every as u64),
            ("INGESTER_REDELIVERY_IDLE_MS", redelivery_idle_ms),
        ] {
            if value == 0 {
                return Err(AppError::Validation(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        Ok(Self {
            database_url,
            redis_url,
            topic,
            topic_partitions,
            consumer_group,
            consumer_name,
            batch_size,
            poll_interval: Duration::from_millis(poll_interval_ms),
            commit_every,
            redelivery_idle: Duration::from_millis(redelivery_idle_ms),
            assignment,
            event_ids,
            live_logs,
            live_log_channel_prefix,
        })
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

fn parse_partition_assignment(
    partition_count: Option<u32>,
    partition_index: Option<u32>,
) -> AppResult<Option<PartitionAssignment>> {
    match (partition_count, partition_index) {
        (None, None) => Ok(None),
        (Some(count), Some(index)) => PartitionAssignment::new(count, index).map(Some),
        _ => Err(AppError::Validation(
            "INGESTER_PARTITION_COUNT and INGESTER_PARTITION_INDEX must be provided together"
                .to_owned(),
        )),
    }
}

fn required_env(name: &str) -> AppResult<String> {
    optional_env(name).ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parse_env<T>(name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(name) {
        Some(value) => parse_value(name, value.as_str()),
        None => Ok(default),
    }
}

fn parse_value<T>(name: &str, value: &str) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|error| AppError::Validation(format!("invalid {name} value '{value}': {error}")))
}
