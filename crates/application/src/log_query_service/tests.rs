use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Mutex;

use shipyard_core::{AppResult, DeploymentId, EventId, ProjectId};
use shipyard_domain::{LogEvent, LogMessage};

use crate::log_ports::LogEventRepository;

use super::LogQueryService;

#[derive(Default)]
struct FakeLogEventRepository {
    events: Mutex<Vec<LogEvent>>,
}

#[async_trait]
impl LogEventRepository for FakeLogEventRepository {
    async fn append_event(&self, event: &LogEvent) -> AppResult<bool> {
        self.events.lock().await.push(event.clone());
        Ok(true)
    }

    async fn list_events_for_deployment(
        &self,
        deployment_id: &DeploymentId,
    ) -> AppResult<Vec<LogEvent>> {
        Ok(self
            .events
            .lock()
            .await
            .iter()
            .filter(|event| event.deployment_id() == deployment_id)
            .cloned()
            .collect())
    }
}

fn event(deployment_id: &str, line: &str, second: u32) -> LogEvent {
    let message = LogMessage::new(
        ProjectId::new("P1").unwrap_or_else(|_| unreachable!()),
        DeploymentId::new(deployment_id).unwrap_or_else(|_| unreachable!()),
        line,
    );
    let timestamp = Utc
        .with_ymd_and_hms(2026, 1, 1, 0, 0, second)
        .single()
        .unwrap_or_else(|| unreachable!());
    LogEvent::from_message(EventId::new(), message, timestamp)
}

async fn seeded_service() -> LogQueryService {
    let repository = Arc::new(FakeLogEventRepository::default());
    for (deployment_id, line, second) in [
        ("D1", "Build Started...", 1),
        ("D2", "other deployment", 2),
        ("D1", "Build Complete", 3),
    ] {
        let _ = repository
            .append_event(&event(deployment_id, line, second))
            .await;
    }
    LogQueryService::new(repository)
}

#[tokio::test]
async fn returns_only_events_of_requested_deployment_in_order() {
    let service = seeded_service().await;

    let logs = service.get_logs("D1").await;
    assert!(logs.is_ok());
    let lines: Vec<String> = logs
        .unwrap_or_default()
        .iter()
        .map(|event| event.content().to_owned())
        .collect();

    assert_eq!(lines, vec!["Build Started...", "Build Complete"]);
}

#[tokio::test]
async fn unknown_deployment_yields_empty_list() {
    let service = seeded_service().await;

    let logs = service.get_logs("D404").await;
    assert!(logs.is_ok());
    assert!(logs.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn blank_deployment_id_yields_empty_list() {
    let service = seeded_service().await;

    let logs = service.get_logs("   ").await;
    assert!(logs.is_ok());
    assert!(logs.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn padded_deployment_id_does_not_match_stored_id() {
    let service = seeded_service().await;

    assert!(service.get_logs(" D1").await.unwrap_or_default().is_empty());
    assert!(service.get_logs("D1 ").await.unwrap_or_default().is_empty());
    assert!(!service.get_logs("D1").await.unwrap_or_default().is_empty());
}
