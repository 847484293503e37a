use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shipyard_application::{
    PublishReceipt, TopicConsumer, TopicDescriptor, TopicMessage, TopicOffset, TopicPublisher,
};
use shipyard_core::{AppError, AppResult};
use shipyard_domain::{PartitionAssignment, TopicPartition};
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct StoredEntry {
    key: String,
    payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct PendingEntry {
    delivered_at: Instant,
}

#[derive(Debug, Default)]
struct GroupState {
    next_index: HashMap<TopicPartition, usize>,
    pending: HashMap<(TopicPartition, usize), PendingEntry>,
}

#[derive(Debug, Default)]
struct TopicState {
    partitions: HashMap<TopicPartition, Vec<StoredEntry>>,
    groups: HashMap<String, GroupState>,
}

/// Process-local durable topic with consumer group semantics.
///
/// A group is served by a single consumer at a time.
///
/// Entries are never removed. Each group tracks a read position per
/// partition and a pending list of delivered but unacknowledged entries,
/// which are handed out again once idle longer than the redelivery window.
#[derive(Clone)]
pub struct InMemoryTopic {
    descriptor: TopicDescriptor,
    state: Arc<Mutex<TopicState>>,
}

impl InMemoryTopic {
    /// Creates an empty topic.
    #[must_use]
    pub fn new(descriptor: TopicDescriptor) -> Self {
        Self {
            descriptor,
            state: Arc::new(Mutex::new(TopicState::default())),
        }
    }

    /// Returns a consumer group member for this topic.
    pub fn consumer(
        &self,
        group: impl Into<String>,
        assignment: Option<PartitionAssignment>,
        redelivery_idle: Duration,
    ) -> AppResult<InMemoryTopicConsumer> {
        let partitions = PartitionAssignment::owned_partitions(
            assignment,
            self.descriptor.partition_count(),
        );
        if partitions.is_empty() {
            return Err(AppError::Validation(format!(
                "partition assignment owns no partition of topic '{}'",
                self.descriptor.name()
            )));
        }

        Ok(InMemoryTopicConsumer {
            topic: self.clone(),
            group: group.into(),
            partitions,
            redelivery_idle,
        })
    }

    /// Returns the number of entries stored in one partition.
    pub async fn partition_len(&self, partition: TopicPartition) -> usize {
        self.state
            .lock()
            .await
            .partitions
            .get(&partition)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl TopicPublisher for InMemoryTopic {
    async fn publish(&self, key: &str, payload: Vec<u8>) -> AppResult<PublishReceipt> {
        let partition = self.descriptor.partition_for_key(key)?;
        let mut state = self.state.lock().await;
        let entries = state.partitions.entry(partition).or_default();
        entries.push(StoredEntry {
            key: key.to_owned(),
            payload,
        });

        Ok(PublishReceipt {
            offset: TopicOffset::new(partition, position_for(entries.len() - 1)),
        })
    }

    async fn flush(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Consumer group member of an [`InMemoryTopic`].
pub struct InMemoryTopicConsumer {
    topic: InMemoryTopic,
    group: String,
    partitions: Vec<TopicPartition>,
    redelivery_idle: Duration,
}

#[async_trait]
impl TopicConsumer for InMemoryTopicConsumer {
    fn topic(&self) -> &str {
        self.topic.descriptor.name()
    }

    async fn fetch_batch(&self, max_messages: usize) -> AppResult<Vec<TopicMessage>> {
        let now = Instant::now();
        let mut guard = self.topic.state.lock().await;
        let state = &mut *guard;
        let group = state.groups.entry(self.group.clone()).or_default();
        let mut batch = Vec::new();

        let mut idle: Vec<(TopicPartition, usize)> = group
            .pending
            .iter()
            .filter(|((partition, _), pending)| {
                self.partitions.contains(partition)
                    && now.duration_since(pending.delivered_at) >= self.redelivery_idle
            })
            .map(|(slot, _)| *slot)
            .collect();
        idle.sort();

        for (partition, index) in idle.into_iter().take(max_messages) {
            let Some(entry) = state
                .partitions
                .get(&partition)
                .and_then(|entries| entries.get(index))
            else {
                continue;
            };
            group.pending.insert(
                (partition, index),
                PendingEntry { delivered_at: now },
            );
            batch.push(to_message(partition, index, entry, true));
        }

        for partition in &self.partitions {
            let Some(entries) = state.partitions.get(partition) else {
                continue;
            };
            let next_index = group.next_index.entry(*partition).or_default();
            while batch.len() < max_messages && *next_index < entries.len() {
                let index = *next_index;
                group.pending.insert(
                    (*partition, index),
                    PendingEntry { delivered_at: now },
                );
                batch.push(to_message(*partition, index, &entries[index], false));
                *next_index += 1;
            }
        }

        Ok(batch)
    }

    async fn commit(&self, offsets: &[TopicOffset]) -> AppResult<()> {
        let mut state = self.topic.state.lock().await;
        let group = state.groups.entry(self.group.clone()).or_default();
        for offset in offsets {
            let index = parse_position(offset.position.as_str())?;
            group.pending.remove(&(offset.partition, index));
        }

        Ok(())
    }

    async fn heartbeat(&self, in_flight: &[TopicOffset]) -> AppResult<()> {
        let now = Instant::now();
        let mut state = self.topic.state.lock().await;
        let group = state.groups.entry(self.group.clone()).or_default();
        for offset in in_flight {
            let index = parse_position(offset.position.as_str())?;
            if let Some(pending) = group.pending.get_mut(&(offset.partition, index)) {
                pending.delivered_at = now;
            }
        }

        Ok(())
    }
}

fn position_for(index: usize) -> String {
    format!("{}-0", index + 1)
}

fn parse_position(position: &str) -> AppResult<usize> {
    position
        .strip_suffix("-0")
        .and_then(|sequence| sequence.parse::<usize>().ok())
        .and_then(|sequence| sequence.checked_sub(1))
        .ok_or_else(|| AppError::Validation(format!("invalid topic offset '{position}'")))
}

fn to_message(
    partition: TopicPartition,
    index: usize,
    entry: &StoredEntry,
    redelivered: bool,
) -> TopicMessage {
    TopicMessage {
        offset: TopicOffset::new(partition, position_for(index)),
        key: Some(entry.key.clone()),
        payload: (!entry.payload.is_empty()).then(|| entry.payload.clone()),
        redelivered,
    }
}
