use async_trait::async_trait;
use shipyard_core::AppResult;

use super::message::PublishReceipt;

/// Producer side of the durable log topic.
#[async_trait]
pub trait TopicPublisher: Send + Sync {
    /// Appends one payload to the partition selected by `key`.
    ///
    /// Returns once the topic acknowledged the write.
    async fn publish(&self, key: &str, payload: Vec<u8>) -> AppResult<PublishReceipt>;

    /// Waits until every publish issued so far is acknowledged.
    async fn flush(&self) -> AppResult<()>;
}
