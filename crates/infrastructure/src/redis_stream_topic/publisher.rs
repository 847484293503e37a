use async_trait::async_trait;
use redis::aio::ConnectionManager;
use shipyard_application::{PublishReceipt, TopicDescriptor, TopicOffset, TopicPublisher};
use shipyard_core::AppResult;
use tracing::debug;

use super::{KEY_FIELD, PAYLOAD_FIELD, stream_key, transient};

/// Appends log payloads to the partition streams of one topic.
#[derive(Clone)]
pub struct RedisStreamPublisher {
    connection: ConnectionManager,
    descriptor: TopicDescriptor,
    max_len: Option<u64>,
}

impl RedisStreamPublisher {
    /// Creates a publisher.
    #[must_use]
    pub fn new(connection: ConnectionManager, descriptor: TopicDescriptor) -> Self {
        Self {
            connection,
            descriptor,
            max_len: None,
        }
    }

    /// Caps every partition stream at roughly `max_len` entries.
    #[must_use]
    pub fn with_max_len(mut self, max_len: u64) -> Self {
        self.max_len = Some(max_len);
        self
    }
}

#[async_trait]
impl TopicPublisher for RedisStreamPublisher {
    async fn publish(&self, key: &str, payload: Vec<u8>) -> AppResult<PublishReceipt> {
        let partition = self.descriptor.partition_for_key(key)?;
        let stream = stream_key(self.descriptor.name(), partition);

        let mut command = redis::cmd("XADD");
        command.arg(stream.as_str());
        if let Some(max_len) = self.max_len {
            command.arg("MAXLEN").arg("~").arg(max_len);
        }
        command
            .arg("*")
            .arg(KEY_FIELD)
            .arg(key)
            .arg(PAYLOAD_FIELD)
            .arg(payload);

        let mut connection = self.connection.clone();
        let position: String = command
            .query_async(&mut connection)
            .await
            .map_err(|error| transient("append to log topic", &error))?;

        debug!(stream = %stream, offset = %position, "published log message");

        Ok(PublishReceipt {
            offset: TopicOffset::new(partition, position),
        })
    }

    async fn flush(&self) -> AppResult<()> {
        // XADD replies only after the entry is stored, so nothing is buffered.
        Ok(())
    }
}
