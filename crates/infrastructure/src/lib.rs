//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_log_event_bus;
mod in_memory_log_event_repository;
mod in_memory_topic;
mod object_store_artifact_store;
mod postgres_log_event_repository;
mod redis_log_event_bus;
mod redis_stream_topic;

#[cfg(test)]
mod pipeline_tests;

pub use in_memory_log_event_bus::InMemoryLogEventBus;
pub use in_memory_log_event_repository::InMemoryLogEventRepository;
pub use in_memory_topic::{InMemoryTopic, InMemoryTopicConsumer};
pub use object_store_artifact_store::ObjectStoreArtifactStore;
pub use postgres_log_event_repository::PostgresLogEventRepository;
pub use redis_log_event_bus::RedisLogEventBus;
pub use redis_stream_topic::{
    ConsumerGroupSettings, RedisStreamConsumer, RedisStreamPublisher, connect_topic_connection,
};
