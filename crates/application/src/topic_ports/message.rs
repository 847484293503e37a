use shipyard_core::{AppError, AppResult};
use shipyard_domain::TopicPartition;

/// Name and partition count of one durable topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicDescriptor {
    name: String,
    partition_count: u32,
}

impl TopicDescriptor {
    /// Creates a topic descriptor.
    pub fn new(name: impl Into<String>, partition_count: u32) -> AppResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AppError::Validation(
                "topic name must not be empty".to_owned(),
            ));
        }

        if partition_count == 0 {
            return Err(AppError::Validation(
                "topic partition_count must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            name,
            partition_count,
        })
    }

    /// Returns the topic name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the number of partitions.
    #[must_use]
    pub fn partition_count(&self) -> u32 {
        self.partition_count
    }

    /// Returns the partition a publish key maps to.
    pub fn partition_for_key(&self, key: &str) -> AppResult<TopicPartition> {
        TopicPartition::for_key(key, self.partition_count)
    }
}

/// Position of one message inside a topic partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicOffset {
    /// Partition holding the message.
    pub partition: TopicPartition,
    /// Transport specific position within the partition.
    pub position: String,
}

impl TopicOffset {
    /// Creates an offset.
    #[must_use]
    pub fn new(partition: TopicPartition, position: impl Into<String>) -> Self {
        Self {
            partition,
            position: position.into(),
        }
    }

    /// Returns a topic-qualified key unique across the whole topic.
    #[must_use]
    pub fn source_key(&self, topic: &str) -> String {
        format!("{topic}/{}/{}", self.partition.index(), self.position)
    }
}

/// One message fetched from a topic by a consumer group member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMessage {
    /// Message position.
    pub offset: TopicOffset,
    /// Publish key, when the producer supplied one.
    pub key: Option<String>,
    /// Raw payload; empty messages carry `None`.
    pub payload: Option<Vec<u8>>,
    /// True when the message was reclaimed after a previous delivery.
    pub redelivered: bool,
}

/// Acknowledgement returned by the topic for one publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Position assigned to the published message.
    pub offset: TopicOffset,
}
