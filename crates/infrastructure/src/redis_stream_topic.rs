//! Durable log topic on Redis Streams.
//!
//! Topic `T` with `N` partitions is stored as the streams `T:0 .. T:N-1`.
//! Entry ids are the offsets and consumer groups track delivery.

use redis::aio::ConnectionManager;
use shipyard_core::{AppError, AppResult};
use shipyard_domain::TopicPartition;

mod consumer;
mod publisher;

pub use consumer::{ConsumerGroupSettings, RedisStreamConsumer};
pub use publisher::RedisStreamPublisher;

const KEY_FIELD: &str = "key";
const PAYLOAD_FIELD: &str = "payload";

/// Opens a managed Redis connection shared by topic adapters.
pub async fn connect_topic_connection(client: redis::Client) -> AppResult<ConnectionManager> {
    ConnectionManager::new(client)
        .await
        .map_err(|error| AppError::Unavailable(format!("failed to connect to redis: {error}")))
}

fn stream_key(topic: &str, partition: TopicPartition) -> String {
    format!("{topic}:{}", partition.index())
}

fn transient(operation: &str, error: &redis::RedisError) -> AppError {
    AppError::Unavailable(format!("failed to {operation}: {error}"))
}

#[cfg(test)]
mod tests;
