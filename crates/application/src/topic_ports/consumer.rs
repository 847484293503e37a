use async_trait::async_trait;
use shipyard_core::AppResult;

use super::message::{TopicMessage, TopicOffset};

/// Consumer group member of the durable log topic.
///
/// Delivery is at-least-once: a fetched message that is never committed
/// is delivered again once its idle time exceeds the redelivery window.
#[async_trait]
pub trait TopicConsumer: Send + Sync {
    /// Returns the topic name this consumer reads.
    fn topic(&self) -> &str;

    /// Fetches up to `max_messages` messages from the owned partitions.
    async fn fetch_batch(&self, max_messages: usize) -> AppResult<Vec<TopicMessage>>;

    /// Acknowledges exactly the given offsets for the consumer group.
    async fn commit(&self, offsets: &[TopicOffset]) -> AppResult<()>;

    /// Signals liveness and keeps ownership of in-flight messages.
    async fn heartbeat(&self, in_flight: &[TopicOffset]) -> AppResult<()>;
}
