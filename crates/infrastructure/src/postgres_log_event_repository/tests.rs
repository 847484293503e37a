use chrono::{Duration, Utc};
use shipyard_application::LogEventRepository;
use shipyard_core::{DeploymentId, EventId, ProjectId};
use shipyard_domain::{LogEvent, LogMessage};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use super::PostgresLogEventRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres log event tests: {error}");
    }

    Some(pool)
}

fn unique_deployment() -> DeploymentId {
    DeploymentId::new(format!("deployment-{}", EventId::new()))
        .unwrap_or_else(|_| unreachable!())
}

fn event(deployment_id: &DeploymentId, line: &str, offset_seconds: i64) -> LogEvent {
    let message = LogMessage::new(
        ProjectId::new("P1").unwrap_or_else(|_| unreachable!()),
        deployment_id.clone(),
        line,
    );
    LogEvent::from_message(
        EventId::new(),
        message,
        Utc::now() + Duration::seconds(offset_seconds),
    )
}

#[tokio::test]
async fn lists_events_by_timestamp_then_insert_order() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresLogEventRepository::new(pool);
    let deployment_id = unique_deployment();
    let late = event(&deployment_id, "Build Complete", 10);
    let early = event(&deployment_id, "Build Started...", 0);

    assert_eq!(repository.append_event(&late).await.ok(), Some(true));
    assert_eq!(repository.append_event(&early).await.ok(), Some(true));

    let listed = repository.list_events_for_deployment(&deployment_id).await;
    assert!(listed.is_ok());
    let lines: Vec<String> = listed
        .unwrap_or_default()
        .iter()
        .map(|event| event.content().to_owned())
        .collect();
    assert_eq!(lines, vec!["Build Started...", "Build Complete"]);
}

#[tokio::test]
async fn duplicate_event_id_is_ignored() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresLogEventRepository::new(pool);
    let deployment_id = unique_deployment();
    let stored = event(&deployment_id, "npm install output", 0);

    assert_eq!(repository.append_event(&stored).await.ok(), Some(true));
    assert_eq!(repository.append_event(&stored).await.ok(), Some(false));

    let listed = repository
        .list_events_for_deployment(&deployment_id)
        .await
        .unwrap_or_default();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].event_id(), stored.event_id());
}

#[tokio::test]
async fn unknown_deployment_lists_nothing() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresLogEventRepository::new(pool);

    let listed = repository
        .list_events_for_deployment(&unique_deployment())
        .await;
    assert!(listed.is_ok());
    assert!(listed.unwrap_or_default().is_empty());
}
