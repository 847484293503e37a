use serde::{Deserialize, Serialize};
use shipyard_domain::LogEvent;
use ts_rs::TS;

/// API error payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/error-response.ts"
)]
pub struct ErrorResponse {
    pub message: String,
}

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ready: bool,
    pub postgres: HealthDependencyStatus,
    pub redis: HealthDependencyStatus,
    pub live_channels: usize,
}

/// One runtime dependency health status.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-dependency-status.ts"
)]
pub struct HealthDependencyStatus {
    pub status: &'static str,
    pub detail: Option<String>,
}

/// API representation of one stored log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/log-event-response.ts"
)]
pub struct LogEventResponse {
    pub event_id: String,
    pub deployment_id: String,
    pub log: String,
    /// RFC 3339 ingestion time.
    pub timestamp: String,
}

impl From<LogEvent> for LogEventResponse {
    fn from(value: LogEvent) -> Self {
        Self {
            event_id: value.event_id().to_string(),
            deployment_id: value.deployment_id().to_string(),
            log: value.content().to_owned(),
            timestamp: value.timestamp().to_rfc3339(),
        }
    }
}

/// Response of `GET /logs/{deploymentId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/logs-response.ts"
)]
pub struct LogsResponse {
    pub logs: Vec<LogEventResponse>,
}

/// Frame sent by a live log viewer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, TS)]
#[serde(tag = "event", rename_all = "lowercase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/client-frame.ts"
)]
pub enum ClientFrame {
    Subscribe { channel: String },
}

/// Payload of a pushed log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/live-log-payload.ts"
)]
pub struct LiveLogPayload {
    pub log: String,
}

/// Payload of a rejected client frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/socket-error-payload.ts"
)]
pub struct SocketErrorPayload {
    pub message: String,
}

/// Frame pushed to a live log viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/server-frame.ts"
)]
pub enum ServerFrame {
    Message(LiveLogPayload),
    Error(SocketErrorPayload),
}

impl ServerFrame {
    pub fn log(line: impl Into<String>) -> Self {
        Self::Message(LiveLogPayload { log: line.into() })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(SocketErrorPayload {
            message: message.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ClientFrame, ServerFrame};

    #[test]
    fn server_frames_use_event_and_data_envelope() {
        let encoded = serde_json::to_value(ServerFrame::log("Subscribed to logs:D1"));
        assert_eq!(
            encoded.ok(),
            Some(serde_json::json!({
                "event": "message",
                "data": { "log": "Subscribed to logs:D1" }
            }))
        );
    }

    #[test]
    fn subscribe_frame_decodes() {
        let decoded =
            serde_json::from_str::<ClientFrame>(r#"{"event":"subscribe","channel":"deploy-D1"}"#);
        assert_eq!(
            decoded.ok(),
            Some(ClientFrame::Subscribe {
                channel: "deploy-D1".to_owned()
            })
        );
    }

    #[test]
    fn unknown_client_event_is_rejected() {
        assert!(serde_json::from_str::<ClientFrame>(r#"{"event":"publish"}"#).is_err());
    }
}
