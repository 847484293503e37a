use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shipyard_application::LogEventRepository;
use shipyard_core::{AppError, AppResult, DeploymentId, EventId, ProjectId};
use shipyard_domain::LogEvent;

/// PostgreSQL-backed insert-only log event store.
#[derive(Clone)]
pub struct PostgresLogEventRepository {
    pool: PgPool,
}

impl PostgresLogEventRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct LogEventRow {
    event_id: Uuid,
    deployment_id: String,
    project_id: String,
    log: String,
    timestamp: DateTime<Utc>,
}

impl LogEventRow {
    fn into_event(self) -> AppResult<LogEvent> {
        let deployment_id = DeploymentId::new(self.deployment_id).map_err(|error| {
            AppError::Internal(format!(
                "stored log event '{}' has invalid deployment id: {error}",
                self.event_id
            ))
        })?;
        let project_id = ProjectId::new(self.project_id).map_err(|error| {
            AppError::Internal(format!(
                "stored log event '{}' has invalid project id: {error}",
                self.event_id
            ))
        })?;

        Ok(LogEvent::restore(
            EventId::from_uuid(self.event_id),
            deployment_id,
            project_id,
            self.log,
            self.timestamp,
        ))
    }
}

#[async_trait]
impl LogEventRepository for PostgresLogEventRepository {
    async fn append_event(&self, event: &LogEvent) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO log_events (event_id, deployment_id, project_id, log, timestamp)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event.event_id().as_uuid())
        .bind(event.deployment_id().as_str())
        .bind(event.project_id().as_str())
        .bind(event.content())
        .bind(event.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Unavailable(format!("failed to append log event: {error}")))?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_events_for_deployment(
        &self,
        deployment_id: &DeploymentId,
    ) -> AppResult<Vec<LogEvent>> {
        let rows = sqlx::query_as::<_, LogEventRow>(
            r#"
            SELECT event_id, deployment_id, project_id, log, timestamp
            FROM log_events
            WHERE deployment_id = $1
            ORDER BY timestamp ASC, seq ASC
            "#,
        )
        .bind(deployment_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Unavailable(format!("failed to list log events: {error}")))?;

        rows.into_iter().map(LogEventRow::into_event).collect()
    }
}

#[cfg(test)]
mod tests;
