//! Live log bus on Redis pub/sub.
//!
//! Each stored event is published as JSON on `<prefix>:<deploymentId>`.
//! Subscribers pattern-match `<prefix>:*` and receive every deployment.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use redis::aio::ConnectionManager;
use tracing::warn;

use shipyard_application::LogEventBus;
use shipyard_core::{AppError, AppResult};
use shipyard_domain::{ChannelName, LogEvent};

/// Redis pub/sub implementation of the live log bus.
#[derive(Clone)]
pub struct RedisLogEventBus {
    client: redis::Client,
    connection: ConnectionManager,
    channel_prefix: String,
}

impl RedisLogEventBus {
    /// Connects a bus publishing under `channel_prefix`.
    pub async fn connect(
        client: redis::Client,
        channel_prefix: impl Into<String>,
    ) -> AppResult<Self> {
        let channel_prefix = channel_prefix.into();
        if channel_prefix.trim().is_empty() {
            return Err(AppError::Validation(
                "live log channel prefix must not be empty".to_owned(),
            ));
        }

        let connection = ConnectionManager::new(client.clone())
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to connect to redis: {error}"))
            })?;

        Ok(Self {
            client,
            connection,
            channel_prefix,
        })
    }

    /// Returns a stream of events published by any producer for any deployment.
    ///
    /// The stream ends when the pub/sub connection drops.
    pub async fn subscribe(&self) -> AppResult<BoxStream<'static, LogEvent>> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(|error| {
            AppError::Unavailable(format!("failed to open redis pub/sub connection: {error}"))
        })?;

        let pattern = format!("{}:*", self.channel_prefix);
        pubsub.psubscribe(pattern.as_str()).await.map_err(|error| {
            AppError::Unavailable(format!(
                "failed to subscribe to live log pattern '{pattern}': {error}"
            ))
        })?;

        Ok(pubsub
            .into_on_message()
            .filter_map(|message| async move {
                let payload = match message.get_payload::<String>() {
                    Ok(payload) => payload,
                    Err(error) => {
                        warn!(error = %error, "skipping unreadable live log message");
                        return None;
                    }
                };

                match serde_json::from_str::<LogEvent>(payload.as_str()) {
                    Ok(event) => Some(event),
                    Err(error) => {
                        warn!(
                            channel = %message.get_channel_name(),
                            error = %error,
                            "skipping undecodable live log message"
                        );
                        None
                    }
                }
            })
            .boxed())
    }
}

#[async_trait]
impl LogEventBus for RedisLogEventBus {
    async fn publish(&self, event: &LogEvent) -> AppResult<()> {
        let channel =
            ChannelName::for_deployment(self.channel_prefix.as_str(), event.deployment_id());
        let payload = serde_json::to_string(event).map_err(|error| {
            AppError::Internal(format!("failed to encode live log event: {error}"))
        })?;

        let mut connection = self.connection.clone();
        redis::cmd("PUBLISH")
            .arg(channel.as_str())
            .arg(payload)
            .query_async::<i64>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to publish live log event: {error}"))
            })?;

        Ok(())
    }
}
