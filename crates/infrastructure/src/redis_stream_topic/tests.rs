use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::streams::StreamPendingReply;
use shipyard_application::{TopicConsumer, TopicDescriptor, TopicPublisher};
use shipyard_core::EventId;
use shipyard_domain::TopicPartition;

use super::{
    ConsumerGroupSettings, RedisStreamConsumer, RedisStreamPublisher, connect_topic_connection,
    stream_key,
};

const GROUP: &str = "shipyard-test-group";

async fn test_connection() -> Option<ConnectionManager> {
    let Ok(redis_url) = std::env::var("REDIS_URL") else {
        return None;
    };

    let client = match redis::Client::open(redis_url.as_str()) {
        Ok(client) => client,
        Err(error) => panic!("invalid REDIS_URL in test: {error}"),
    };

    match connect_topic_connection(client).await {
        Ok(connection) => Some(connection),
        Err(error) => panic!("failed to connect to REDIS_URL in test: {error}"),
    }
}

fn unique_topic() -> TopicDescriptor {
    TopicDescriptor::new(format!("shipyard-test-{}", EventId::new()), 2)
        .unwrap_or_else(|_| unreachable!())
}

async fn group_member(
    connection: &ConnectionManager,
    descriptor: &TopicDescriptor,
    consumer_name: &str,
    redelivery_idle: Duration,
) -> RedisStreamConsumer {
    let consumer = RedisStreamConsumer::new(
        connection.clone(),
        descriptor.clone(),
        ConsumerGroupSettings {
            group: GROUP.to_owned(),
            consumer_name: consumer_name.to_owned(),
            assignment: None,
            redelivery_idle,
        },
    )
    .unwrap_or_else(|_| unreachable!());
    assert!(consumer.ensure_consumer_groups().await.is_ok());
    consumer
}

async fn pending_count(connection: &ConnectionManager, stream: &str) -> usize {
    let mut connection = connection.clone();
    let reply: StreamPendingReply = redis::cmd("XPENDING")
        .arg(stream)
        .arg(GROUP)
        .query_async(&mut connection)
        .await
        .unwrap_or_else(|error| panic!("failed to read pending entries in test: {error}"));
    reply.count()
}

async fn drop_topic(connection: &ConnectionManager, descriptor: &TopicDescriptor) {
    let mut connection = connection.clone();
    for index in 0..descriptor.partition_count() {
        let _: Result<(), redis::RedisError> = redis::cmd("DEL")
            .arg(stream_key(descriptor.name(), TopicPartition::new(index)))
            .query_async(&mut connection)
            .await;
    }
}

#[test]
fn stream_key_appends_partition_index() {
    assert_eq!(
        stream_key("container-logs", TopicPartition::new(3)),
        "container-logs:3"
    );
}

#[tokio::test]
async fn consumer_group_creation_is_idempotent() {
    let Some(connection) = test_connection().await else {
        return;
    };
    let descriptor = unique_topic();

    let consumer =
        group_member(&connection, &descriptor, "ingester-a", Duration::from_secs(30)).await;

    assert!(consumer.ensure_consumer_groups().await.is_ok());
    drop_topic(&connection, &descriptor).await;
}

#[tokio::test]
async fn published_payload_is_fetched_with_its_key_and_offset() {
    let Some(connection) = test_connection().await else {
        return;
    };
    let descriptor = unique_topic();
    let consumer =
        group_member(&connection, &descriptor, "ingester-a", Duration::from_secs(30)).await;
    let publisher = RedisStreamPublisher::new(connection.clone(), descriptor.clone());

    let receipt = publisher
        .publish("D1", br#"{"projectId":"P1","deploymentId":"D1","log":"x"}"#.to_vec())
        .await;
    assert!(receipt.is_ok());
    let receipt = receipt.unwrap_or_else(|_| unreachable!());

    let batch = consumer.fetch_batch(10).await.unwrap_or_default();

    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].offset, receipt.offset);
    assert_eq!(batch[0].key.as_deref(), Some("D1"));
    assert_eq!(
        batch[0].payload.as_deref(),
        Some(br#"{"projectId":"P1","deploymentId":"D1","log":"x"}"#.as_slice())
    );
    assert!(!batch[0].redelivered);
    drop_topic(&connection, &descriptor).await;
}

#[tokio::test]
async fn unacknowledged_message_is_redelivered_after_idle_window() {
    let Some(connection) = test_connection().await else {
        return;
    };
    let descriptor = unique_topic();
    let idle = Duration::from_millis(100);
    let crashed = group_member(&connection, &descriptor, "ingester-a", idle).await;
    let survivor = group_member(&connection, &descriptor, "ingester-b", idle).await;
    let publisher = RedisStreamPublisher::new(connection.clone(), descriptor.clone());
    let _ = publisher.publish("D1", b"line".to_vec()).await;

    let first = crashed.fetch_batch(10).await.unwrap_or_default();
    assert_eq!(first.len(), 1);
    assert!(survivor.fetch_batch(10).await.unwrap_or_default().is_empty());

    tokio::time::sleep(Duration::from_millis(250)).await;
    let redelivered = survivor.fetch_batch(10).await.unwrap_or_default();

    assert_eq!(redelivered.len(), 1);
    assert!(redelivered[0].redelivered);
    assert_eq!(redelivered[0].offset, first[0].offset);
    assert_eq!(redelivered[0].payload.as_deref(), Some(b"line".as_slice()));
    drop_topic(&connection, &descriptor).await;
}

#[tokio::test]
async fn heartbeat_postpones_reclaim_by_other_members() {
    let Some(connection) = test_connection().await else {
        return;
    };
    let descriptor = unique_topic();
    let idle = Duration::from_millis(600);
    let busy = group_member(&connection, &descriptor, "ingester-a", idle).await;
    let other = group_member(&connection, &descriptor, "ingester-b", idle).await;
    let publisher = RedisStreamPublisher::new(connection.clone(), descriptor.clone());
    let _ = publisher.publish("D1", b"slow write".to_vec()).await;

    let batch = busy.fetch_batch(10).await.unwrap_or_default();
    assert_eq!(batch.len(), 1);
    let in_flight = vec![batch[0].offset.clone()];

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(busy.heartbeat(&in_flight).await.is_ok());
    tokio::time::sleep(Duration::from_millis(350)).await;

    assert!(other.fetch_batch(10).await.unwrap_or_default().is_empty());

    tokio::time::sleep(Duration::from_millis(400)).await;
    let reclaimed = other.fetch_batch(10).await.unwrap_or_default();
    assert_eq!(reclaimed.len(), 1);
    assert!(reclaimed[0].redelivered);
    drop_topic(&connection, &descriptor).await;
}

#[tokio::test]
async fn commit_clears_pending_entries() {
    let Some(connection) = test_connection().await else {
        return;
    };
    let descriptor = unique_topic();
    let idle = Duration::from_millis(100);
    let consumer = group_member(&connection, &descriptor, "ingester-a", idle).await;
    let other = group_member(&connection, &descriptor, "ingester-b", idle).await;
    let publisher = RedisStreamPublisher::new(connection.clone(), descriptor.clone());
    let receipt = publisher
        .publish("D1", b"line".to_vec())
        .await
        .unwrap_or_else(|_| unreachable!());
    let stream = stream_key(descriptor.name(), receipt.offset.partition);

    let batch = consumer.fetch_batch(10).await.unwrap_or_default();
    assert_eq!(pending_count(&connection, stream.as_str()).await, 1);

    let offsets: Vec<_> = batch.iter().map(|message| message.offset.clone()).collect();
    assert!(consumer.commit(&offsets).await.is_ok());

    assert_eq!(pending_count(&connection, stream.as_str()).await, 0);
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(other.fetch_batch(10).await.unwrap_or_default().is_empty());
    drop_topic(&connection, &descriptor).await;
}
