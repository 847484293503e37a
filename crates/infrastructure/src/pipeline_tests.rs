//! Producer to query flow over the in-memory adapters.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use shipyard_application::{
    IngestionSettings, LogIngestionService, LogPublisher, LogQueryService, LogShipper,
    PublishPolicy, TopicDescriptor,
};
use shipyard_core::{DeploymentId, ProjectId};
use shipyard_domain::BuildMarker;

use crate::{InMemoryLogEventBus, InMemoryLogEventRepository, InMemoryTopic};

fn topic() -> InMemoryTopic {
    InMemoryTopic::new(
        TopicDescriptor::new("container-logs", 4).unwrap_or_else(|_| unreachable!()),
    )
}

fn publisher(topic: &InMemoryTopic, deployment_id: &str) -> Arc<LogPublisher> {
    let publisher = LogPublisher::new(
        Arc::new(topic.clone()),
        ProjectId::new("P1").unwrap_or_else(|_| unreachable!()),
        DeploymentId::new(deployment_id).unwrap_or_else(|_| unreachable!()),
        PublishPolicy::default(),
    );
    assert!(publisher.is_ok());
    Arc::new(publisher.unwrap_or_else(|_| unreachable!()))
}

#[tokio::test]
async fn shipped_build_output_is_queryable_in_order() {
    let topic = topic();
    let shipper = LogShipper::spawn(publisher(&topic, "D1"), 4).unwrap_or_else(|_| unreachable!());
    let sender = shipper.sender();
    for line in [
        BuildMarker::Started.to_string(),
        "added 120 packages".to_owned(),
        "error: deprecated dependency".to_owned(),
        BuildMarker::Complete.to_string(),
        BuildMarker::Done.to_string(),
    ] {
        assert!(sender.send(line).await.is_ok());
    }
    drop(sender);
    let shipped = shipper.finish().await.unwrap_or_default();
    assert_eq!(shipped.published, 5);

    let repository = Arc::new(InMemoryLogEventRepository::new());
    let ingester = LogIngestionService::new(repository.clone(), IngestionSettings::default())
        .unwrap_or_else(|_| unreachable!());
    let consumer = topic
        .consumer("api-server-logs-consumer", None, Duration::from_secs(30))
        .unwrap_or_else(|_| unreachable!());
    let report = ingester.poll_once(&consumer, 100).await.unwrap_or_default();
    assert_eq!(report.ingested, 5);

    let logs = LogQueryService::new(repository)
        .get_logs("D1")
        .await
        .unwrap_or_default();
    let lines: Vec<&str> = logs.iter().map(|event| event.content()).collect();
    assert_eq!(
        lines,
        vec![
            "Build Started...",
            "added 120 packages",
            "error: deprecated dependency",
            "Build Complete",
            "Done",
        ]
    );
}

#[tokio::test]
async fn concurrent_deployments_stay_isolated() {
    let topic = topic();
    let first = publisher(&topic, "D1");
    let second = publisher(&topic, "D2");
    for index in 0..3 {
        let _ = first.publish(format!("d1 line {index}").as_str()).await;
        let _ = second.publish(format!("d2 line {index}").as_str()).await;
    }

    let repository = Arc::new(InMemoryLogEventRepository::new());
    let ingester = LogIngestionService::new(repository.clone(), IngestionSettings::default())
        .unwrap_or_else(|_| unreachable!());
    let consumer = topic
        .consumer("api-server-logs-consumer", None, Duration::from_secs(30))
        .unwrap_or_else(|_| unreachable!());
    let _ = ingester.poll_once(&consumer, 100).await;

    let query = LogQueryService::new(repository);
    let d2: Vec<String> = query
        .get_logs("D2")
        .await
        .unwrap_or_default()
        .iter()
        .map(|event| event.content().to_owned())
        .collect();
    assert_eq!(d2, vec!["d2 line 0", "d2 line 1", "d2 line 2"]);
    assert!(query.get_logs("D3").await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn ingested_events_reach_live_subscribers() {
    let topic = topic();
    let _ = publisher(&topic, "D1").publish("live line").await;

    let bus = Arc::new(InMemoryLogEventBus::new(16));
    let mut live = bus.subscribe();
    let ingester = LogIngestionService::new(
        Arc::new(InMemoryLogEventRepository::new()),
        IngestionSettings::default(),
    )
    .unwrap_or_else(|_| unreachable!())
    .with_event_bus(bus);
    let consumer = topic
        .consumer("api-server-logs-consumer", None, Duration::from_secs(30))
        .unwrap_or_else(|_| unreachable!());
    let _ = ingester.poll_once(&consumer, 10).await;

    let event = live.next().await;
    assert_eq!(event.as_ref().map(|event| event.content()), Some("live line"));
    assert_eq!(
        event.as_ref().map(|event| event.deployment_id().as_str()),
        Some("D1")
    );
}
