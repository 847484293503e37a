use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shipyard_core::{AppError, AppResult, DeploymentId, EventId, ProjectId};

/// Wire payload carried on the log topic.
///
/// Producers emit camelCase keys. The upper-case keys written by older
/// build images are still accepted when decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogMessage {
    /// Project that owns the deployment.
    #[serde(alias = "PROJECT_ID")]
    pub project_id: ProjectId,
    /// Deployment the line was produced for.
    #[serde(alias = "DEPLOYEMENT_ID", alias = "DEPLOYMENT_ID")]
    pub deployment_id: DeploymentId,
    /// Raw output line.
    pub log: String,
}

impl LogMessage {
    /// Creates a wire payload for one output line.
    #[must_use]
    pub fn new(project_id: ProjectId, deployment_id: DeploymentId, log: impl Into<String>) -> Self {
        Self {
            project_id,
            deployment_id,
            log: log.into(),
        }
    }

    /// Decodes a payload received from the topic.
    pub fn from_json(payload: &[u8]) -> AppResult<Self> {
        serde_json::from_slice(payload).map_err(|error| {
            AppError::Validation(format!("malformed log message payload: {error}"))
        })
    }

    /// Encodes the payload for publishing.
    pub fn to_json(&self) -> AppResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|error| AppError::Internal(format!("failed to encode log message: {error}")))
    }
}

/// One persisted log line.
///
/// Events are insert-only: nothing in the pipeline updates or deletes a
/// stored event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    event_id: EventId,
    deployment_id: DeploymentId,
    project_id: ProjectId,
    content: String,
    timestamp: DateTime<Utc>,
}

impl LogEvent {
    /// Creates a log event from a decoded topic message.
    #[must_use]
    pub fn from_message(event_id: EventId, message: LogMessage, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_id,
            deployment_id: message.deployment_id,
            project_id: message.project_id,
            content: message.log,
            timestamp,
        }
    }

    /// Rebuilds a log event from stored columns.
    #[must_use]
    pub fn restore(
        event_id: EventId,
        deployment_id: DeploymentId,
        project_id: ProjectId,
        content: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id,
            deployment_id,
            project_id,
            content,
            timestamp,
        }
    }

    /// Returns the unique event identifier.
    #[must_use]
    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    /// Returns the owning deployment.
    #[must_use]
    pub fn deployment_id(&self) -> &DeploymentId {
        &self.deployment_id
    }

    /// Returns the owning project.
    #[must_use]
    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    /// Returns the raw log line.
    #[must_use]
    pub fn content(&self) -> &str {
        self.content.as_str()
    }

    /// Returns the ingestion timestamp.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
