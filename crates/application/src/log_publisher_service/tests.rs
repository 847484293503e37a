use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use shipyard_core::{AppError, AppResult, DeploymentId, ProjectId};
use shipyard_domain::{BuildMarker, LogMessage, TopicPartition};

use crate::topic_ports::{PublishReceipt, TopicOffset, TopicPublisher};

use super::{LogPublisher, LogShipper, PublishPolicy};

#[derive(Default)]
struct FakeTopicPublisher {
    published: Mutex<Vec<(String, LogMessage)>>,
    transient_failures_remaining: Mutex<u32>,
    permanent_failure: bool,
    stall: bool,
    flushes: Mutex<u32>,
}

#[async_trait]
impl TopicPublisher for FakeTopicPublisher {
    async fn publish(&self, key: &str, payload: Vec<u8>) -> AppResult<PublishReceipt> {
        if self.stall {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        if self.permanent_failure {
            return Err(AppError::Validation("payload rejected".to_owned()));
        }

        {
            let mut remaining = self.transient_failures_remaining.lock().await;
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AppError::Unavailable("broker unavailable".to_owned()));
            }
        }

        let message = LogMessage::from_json(&payload)?;
        let mut published = self.published.lock().await;
        published.push((key.to_owned(), message));

        Ok(PublishReceipt {
            offset: TopicOffset::new(TopicPartition::new(0), published.len().to_string()),
        })
    }

    async fn flush(&self) -> AppResult<()> {
        *self.flushes.lock().await += 1;
        Ok(())
    }
}

fn build_publisher(topic: Arc<FakeTopicPublisher>, policy: PublishPolicy) -> LogPublisher {
    LogPublisher::new(
        topic,
        ProjectId::new("P1").unwrap_or_else(|_| unreachable!()),
        DeploymentId::new("D1").unwrap_or_else(|_| unreachable!()),
        policy,
    )
    .unwrap_or_else(|_| unreachable!())
}

fn fast_policy() -> PublishPolicy {
    PublishPolicy {
        attempt_timeout: Duration::from_millis(100),
        max_attempts: 3,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(40),
    }
}

#[tokio::test]
async fn publish_keys_messages_by_deployment() {
    let topic = Arc::new(FakeTopicPublisher::default());
    let publisher = build_publisher(topic.clone(), fast_policy());

    assert!(publisher.publish_marker(&BuildMarker::Started).await.is_ok());
    assert!(publisher.publish("npm install output").await.is_ok());

    let published = topic.published.lock().await;
    assert_eq!(published.len(), 2);
    assert!(published.iter().all(|(key, _)| key == "D1"));
    assert_eq!(published[0].1.log, "Build Started...");
    assert_eq!(published[1].1.project_id.as_str(), "P1");
    assert_eq!(published[1].1.deployment_id.as_str(), "D1");
}

#[tokio::test(start_paused = true)]
async fn publish_retries_transient_failures() {
    let topic = Arc::new(FakeTopicPublisher::default());
    *topic.transient_failures_remaining.lock().await = 2;
    let publisher = build_publisher(topic.clone(), fast_policy());

    assert!(publisher.publish("line").await.is_ok());
    assert_eq!(topic.published.lock().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn publish_reports_error_after_attempts_exhausted() {
    let topic = Arc::new(FakeTopicPublisher::default());
    *topic.transient_failures_remaining.lock().await = 5;
    let publisher = build_publisher(topic.clone(), fast_policy());

    let result = publisher.publish("line").await;
    assert!(matches!(result, Err(AppError::Unavailable(_))));
    assert_eq!(*topic.transient_failures_remaining.lock().await, 2);
}

#[tokio::test]
async fn publish_does_not_retry_permanent_failures() {
    let topic = Arc::new(FakeTopicPublisher {
        permanent_failure: true,
        ..FakeTopicPublisher::default()
    });
    let publisher = build_publisher(topic, fast_policy());

    let result = publisher.publish("line").await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test(start_paused = true)]
async fn publish_times_out_on_stalled_topic() {
    let topic = Arc::new(FakeTopicPublisher {
        stall: true,
        ..FakeTopicPublisher::default()
    });
    let publisher = build_publisher(topic, fast_policy());

    let result = publisher.publish("line").await;
    assert!(matches!(result, Err(AppError::Unavailable(message)) if message.contains("timed out")));
}

#[test]
fn publisher_rejects_zero_attempts() {
    let result = LogPublisher::new(
        Arc::new(FakeTopicPublisher::default()),
        ProjectId::new("P1").unwrap_or_else(|_| unreachable!()),
        DeploymentId::new("D1").unwrap_or_else(|_| unreachable!()),
        PublishPolicy {
            max_attempts: 0,
            ..PublishPolicy::default()
        },
    );
    assert!(result.is_err());
}

#[test]
fn backoff_doubles_up_to_cap() {
    let policy = fast_policy();
    assert_eq!(policy.backoff_for(1), Duration::from_millis(10));
    assert_eq!(policy.backoff_for(2), Duration::from_millis(20));
    assert_eq!(policy.backoff_for(4), Duration::from_millis(40));
}

#[tokio::test]
async fn shipper_publishes_every_queued_line_before_finishing() {
    let topic = Arc::new(FakeTopicPublisher::default());
    let publisher = Arc::new(build_publisher(topic.clone(), fast_policy()));
    let shipper = LogShipper::spawn(publisher, 2);
    assert!(shipper.is_ok());
    let shipper = shipper.unwrap_or_else(|_| unreachable!());

    let sender = shipper.sender();
    let reader = tokio::spawn(async move {
        for index in 0..10 {
            if sender.send(format!("line {index}")).await.is_err() {
                return false;
            }
        }
        true
    });
    assert!(reader.await.unwrap_or(false));

    let report = shipper.finish().await;
    assert!(report.is_ok());
    let report = report.unwrap_or_default();
    assert_eq!(report.published, 10);
    assert!(report.is_complete());

    let published = topic.published.lock().await;
    let lines: Vec<&str> = published.iter().map(|(_, message)| message.log.as_str()).collect();
    assert_eq!(lines.first().copied(), Some("line 0"));
    assert_eq!(lines.last().copied(), Some("line 9"));
    assert_eq!(*topic.flushes.lock().await, 1);
}

#[tokio::test(start_paused = true)]
async fn shipper_reports_failed_lines_to_caller() {
    let topic = Arc::new(FakeTopicPublisher::default());
    *topic.transient_failures_remaining.lock().await = 3;
    let publisher = Arc::new(build_publisher(topic, fast_policy()));
    let shipper = LogShipper::spawn(publisher, 4).unwrap_or_else(|_| unreachable!());

    let sender = shipper.sender();
    assert!(sender.send("lost line").await.is_ok());
    assert!(sender.send("kept line").await.is_ok());
    drop(sender);

    let report = shipper.finish().await.unwrap_or_default();
    assert_eq!(report.published, 1);
    assert_eq!(report.failed, 1);
    assert!(!report.is_complete());
    assert!(report.first_error.is_some());
}

#[tokio::test]
async fn shipper_rejects_zero_capacity() {
    let topic = Arc::new(FakeTopicPublisher::default());
    let publisher = Arc::new(build_publisher(topic, fast_policy()));
    assert!(LogShipper::spawn(publisher, 0).is_err());
}
