use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamAutoClaimReply, StreamId, StreamReadReply};
use shipyard_application::{TopicConsumer, TopicDescriptor, TopicMessage, TopicOffset};
use shipyard_core::{AppError, AppResult};
use shipyard_domain::{PartitionAssignment, TopicPartition};
use tracing::{debug, info};

use super::{KEY_FIELD, PAYLOAD_FIELD, stream_key, transient};

/// Consumer group membership of one ingester process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerGroupSettings {
    /// Consumer group name shared by all ingesters.
    pub group: String,
    /// Name of this member inside the group.
    pub consumer_name: String,
    /// Optional partition ownership; all partitions when unset.
    pub assignment: Option<PartitionAssignment>,
    /// Idle time after which an unacknowledged entry is reclaimed.
    pub redelivery_idle: Duration,
}

/// Consumer group member reading the partition streams of one topic.
pub struct RedisStreamConsumer {
    connection: ConnectionManager,
    descriptor: TopicDescriptor,
    group: String,
    consumer_name: String,
    partitions: Vec<TopicPartition>,
    redelivery_idle_ms: u64,
    cursor: AtomicUsize,
}

impl RedisStreamConsumer {
    /// Creates a consumer for the partitions selected by `settings`.
    pub fn new(
        connection: ConnectionManager,
        descriptor: TopicDescriptor,
        settings: ConsumerGroupSettings,
    ) -> AppResult<Self> {
        if settings.group.trim().is_empty() {
            return Err(AppError::Validation(
                "consumer group must not be empty".to_owned(),
            ));
        }

        if settings.consumer_name.trim().is_empty() {
            return Err(AppError::Validation(
                "consumer name must not be empty".to_owned(),
            ));
        }

        let partitions = PartitionAssignment::owned_partitions(
            settings.assignment,
            descriptor.partition_count(),
        );
        if partitions.is_empty() {
            return Err(AppError::Validation(format!(
                "partition assignment owns no partition of topic '{}'",
                descriptor.name()
            )));
        }

        let redelivery_idle_ms = u64::try_from(settings.redelivery_idle.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);

        Ok(Self {
            connection,
            descriptor,
            group: settings.group,
            consumer_name: settings.consumer_name,
            partitions,
            redelivery_idle_ms,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Returns the partitions this consumer reads.
    #[must_use]
    pub fn partitions(&self) -> &[TopicPartition] {
        &self.partitions
    }

    /// Creates the consumer group on every owned partition stream.
    ///
    /// New groups start at the beginning of each stream. Existing groups
    /// keep their position.
    pub async fn ensure_consumer_groups(&self) -> AppResult<()> {
        let mut connection = self.connection.clone();
        for partition in &self.partitions {
            let stream = self.stream(*partition);
            let created: Result<(), redis::RedisError> = redis::cmd("XGROUP")
                .arg("CREATE")
                .arg(stream.as_str())
                .arg(self.group.as_str())
                .arg("0")
                .arg("MKSTREAM")
                .query_async(&mut connection)
                .await;

            match created {
                Ok(()) => info!(stream = %stream, group = %self.group, "created consumer group"),
                Err(error) if error.code() == Some("BUSYGROUP") => {}
                Err(error) => return Err(transient("create consumer group", &error)),
            }
        }

        Ok(())
    }

    fn stream(&self, partition: TopicPartition) -> String {
        stream_key(self.descriptor.name(), partition)
    }

    fn rotated_partitions(&self) -> Vec<TopicPartition> {
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % self.partitions.len();
        self.partitions[start..]
            .iter()
            .chain(self.partitions[..start].iter())
            .copied()
            .collect()
    }

    async fn reclaim_idle(
        &self,
        connection: &mut ConnectionManager,
        partition: TopicPartition,
        count: usize,
    ) -> AppResult<Vec<TopicMessage>> {
        let reply: StreamAutoClaimReply = redis::cmd("XAUTOCLAIM")
            .arg(self.stream(partition))
            .arg(self.group.as_str())
            .arg(self.consumer_name.as_str())
            .arg(self.redelivery_idle_ms)
            .arg("0-0")
            .arg("COUNT")
            .arg(count)
            .query_async(connection)
            .await
            .map_err(|error| transient("reclaim idle log messages", &error))?;

        Ok(reply
            .claimed
            .iter()
            .map(|entry| to_message(partition, entry, true))
            .collect())
    }

    async fn read_new(
        &self,
        connection: &mut ConnectionManager,
        partition: TopicPartition,
        count: usize,
    ) -> AppResult<Vec<TopicMessage>> {
        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(self.group.as_str())
            .arg(self.consumer_name.as_str())
            .arg("COUNT")
            .arg(count)
            .arg("STREAMS")
            .arg(self.stream(partition))
            .arg(">")
            .query_async(connection)
            .await
            .map_err(|error| transient("read log messages", &error))?;

        Ok(reply
            .map(|reply| {
                reply
                    .keys
                    .iter()
                    .flat_map(|stream| stream.ids.iter())
                    .map(|entry| to_message(partition, entry, false))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl TopicConsumer for RedisStreamConsumer {
    fn topic(&self) -> &str {
        self.descriptor.name()
    }

    async fn fetch_batch(&self, max_messages: usize) -> AppResult<Vec<TopicMessage>> {
        let mut connection = self.connection.clone();
        let partitions = self.rotated_partitions();
        let mut batch = Vec::new();

        for partition in &partitions {
            let remaining = max_messages.saturating_sub(batch.len());
            if remaining == 0 {
                return Ok(batch);
            }
            batch.extend(
                self.reclaim_idle(&mut connection, *partition, remaining)
                    .await?,
            );
        }

        for partition in &partitions {
            let remaining = max_messages.saturating_sub(batch.len());
            if remaining == 0 {
                break;
            }
            batch.extend(self.read_new(&mut connection, *partition, remaining).await?);
        }

        Ok(batch)
    }

    async fn commit(&self, offsets: &[TopicOffset]) -> AppResult<()> {
        let mut connection = self.connection.clone();
        for (partition, positions) in group_by_partition(offsets) {
            let acknowledged: i64 = redis::cmd("XACK")
                .arg(self.stream(partition))
                .arg(self.group.as_str())
                .arg(positions.as_slice())
                .query_async(&mut connection)
                .await
                .map_err(|error| transient("acknowledge log messages", &error))?;

            debug!(
                partition = partition.index(),
                requested = positions.len(),
                acknowledged,
                "acknowledged log offsets"
            );
        }

        Ok(())
    }

    async fn heartbeat(&self, in_flight: &[TopicOffset]) -> AppResult<()> {
        let mut connection = self.connection.clone();
        for (partition, positions) in group_by_partition(in_flight) {
            redis::cmd("XCLAIM")
                .arg(self.stream(partition))
                .arg(self.group.as_str())
                .arg(self.consumer_name.as_str())
                .arg(0)
                .arg(positions.as_slice())
                .arg("JUSTID")
                .query_async::<()>(&mut connection)
                .await
                .map_err(|error| transient("extend log message ownership", &error))?;
        }

        Ok(())
    }
}

fn to_message(partition: TopicPartition, entry: &StreamId, redelivered: bool) -> TopicMessage {
    TopicMessage {
        offset: TopicOffset::new(partition, entry.id.clone()),
        key: entry.get::<String>(KEY_FIELD),
        payload: entry.get::<Vec<u8>>(PAYLOAD_FIELD),
        redelivered,
    }
}

fn group_by_partition(offsets: &[TopicOffset]) -> BTreeMap<TopicPartition, Vec<&str>> {
    let mut grouped: BTreeMap<TopicPartition, Vec<&str>> = BTreeMap::new();
    for offset in offsets {
        grouped
            .entry(offset.partition)
            .or_default()
            .push(offset.position.as_str());
    }
    grouped
}
