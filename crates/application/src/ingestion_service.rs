use std::sync::Arc;

use chrono::Utc;
use shipyard_core::{AppError, AppResult, EventId};
use shipyard_domain::{LogEvent, LogMessage};
use tracing::{debug, info, warn};

use crate::log_ports::{LogEventBus, LogEventRepository};
use crate::topic_ports::{TopicConsumer, TopicMessage, TopicOffset};

mod report;

pub use report::{BatchReport, MessageOutcome};

/// How stored events get their `event_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventIdStrategy {
    /// Fresh random id per delivery attempt.
    ///
    /// A message redelivered after its row was written (for example when
    /// the commit failed) is stored again under a new id.
    Random,
    /// Id derived from topic, partition and offset.
    ///
    /// Redeliveries map onto the already stored row and are skipped by the
    /// store, so every message yields exactly one row.
    Deterministic,
}

impl EventIdStrategy {
    /// Parses a configuration value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "deterministic" => Ok(Self::Deterministic),
            other => Err(AppError::Validation(format!(
                "event id strategy must be 'random' or 'deterministic', got '{other}'"
            ))),
        }
    }

    fn event_id_for(self, topic: &str, offset: &TopicOffset) -> EventId {
        match self {
            Self::Random => EventId::new(),
            Self::Deterministic => EventId::derived_from(offset.source_key(topic).as_str()),
        }
    }
}

/// Tuning for one ingestion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionSettings {
    /// Number of resolved messages after which offsets are committed mid-batch.
    pub commit_every: usize,
    /// Event id assignment.
    pub event_ids: EventIdStrategy,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            commit_every: 10,
            event_ids: EventIdStrategy::Random,
        }
    }
}

/// Batch consumer that turns topic messages into stored log events.
#[derive(Clone)]
pub struct LogIngestionService {
    repository: Arc<dyn LogEventRepository>,
    event_bus: Option<Arc<dyn LogEventBus>>,
    settings: IngestionSettings,
}

impl LogIngestionService {
    /// Creates an ingestion service.
    pub fn new(
        repository: Arc<dyn LogEventRepository>,
        settings: IngestionSettings,
    ) -> AppResult<Self> {
        if settings.commit_every == 0 {
            return Err(AppError::Validation(
                "commit_every must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            repository,
            event_bus: None,
            settings,
        })
    }

    /// Forwards every stored event to live viewers through `event_bus`.
    #[must_use]
    pub fn with_event_bus(mut self, event_bus: Arc<dyn LogEventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Fetches one batch from the consumer and processes it.
    pub async fn poll_once(
        &self,
        consumer: &dyn TopicConsumer,
        batch_size: usize,
    ) -> AppResult<BatchReport> {
        if batch_size == 0 {
            return Err(AppError::Validation(
                "batch_size must be greater than zero".to_owned(),
            ));
        }

        let batch = consumer.fetch_batch(batch_size).await?;
        Ok(self.process_batch(consumer, batch).await)
    }

    /// Processes one batch sequentially.
    ///
    /// Only ingested and dropped messages are committed. A message whose
    /// write failed stays uncommitted and comes back on a later fetch. A
    /// failure never aborts the rest of the batch.
    pub async fn process_batch(
        &self,
        consumer: &dyn TopicConsumer,
        batch: Vec<TopicMessage>,
    ) -> BatchReport {
        let mut report = BatchReport {
            received: batch.len(),
            ..BatchReport::default()
        };
        if batch.is_empty() {
            return report;
        }

        let topic = consumer.topic().to_owned();
        let mut resolved: Vec<TopicOffset> = Vec::new();

        for (index, message) in batch.iter().enumerate() {
            let in_flight: Vec<TopicOffset> = batch[index..]
                .iter()
                .map(|pending| pending.offset.clone())
                .collect();
            if let Err(error) = consumer.heartbeat(&in_flight).await {
                warn!(topic = %topic, error = %error, "consumer heartbeat failed");
            }

            match self.process_message(topic.as_str(), message).await {
                MessageOutcome::Ingested(event) => {
                    report.ingested += 1;
                    resolved.push(message.offset.clone());
                    self.publish_live(&event).await;
                }
                MessageOutcome::Duplicate => {
                    report.duplicates += 1;
                    resolved.push(message.offset.clone());
                }
                MessageOutcome::Retryable(reason) => {
                    report.retryable += 1;
                    warn!(
                        topic = %topic,
                        partition = message.offset.partition.index(),
                        offset = %message.offset.position,
                        reason = %reason,
                        "log message left uncommitted for redelivery"
                    );
                }
                MessageOutcome::Dropped(reason) => {
                    report.dropped += 1;
                    resolved.push(message.offset.clone());
                    warn!(
                        topic = %topic,
                        partition = message.offset.partition.index(),
                        offset = %message.offset.position,
                        reason = %reason,
                        "dropping undecodable log message"
                    );
                }
            }

            if resolved.len() >= self.settings.commit_every {
                commit_resolved(consumer, &mut resolved, &mut report).await;
            }
        }

        commit_resolved(consumer, &mut resolved, &mut report).await;

        info!(
            topic = %topic,
            received = report.received,
            ingested = report.ingested,
            duplicates = report.duplicates,
            retryable = report.retryable,
            dropped = report.dropped,
            committed = report.committed.len(),
            "log batch processed"
        );

        report
    }

    /// Decodes and stores one message.
    pub async fn process_message(&self, topic: &str, message: &TopicMessage) -> MessageOutcome {
        let Some(payload) = message.payload.as_deref().filter(|value| !value.is_empty()) else {
            return MessageOutcome::Dropped("message has no payload".to_owned());
        };

        let log_message = match LogMessage::from_json(payload) {
            Ok(log_message) => log_message,
            Err(error) => return MessageOutcome::Dropped(error.to_string()),
        };

        let event_id = self.settings.event_ids.event_id_for(topic, &message.offset);
        let event = LogEvent::from_message(event_id, log_message, Utc::now());

        match self.repository.append_event(&event).await {
            Ok(true) => MessageOutcome::Ingested(event),
            Ok(false) => MessageOutcome::Duplicate,
            Err(error) => MessageOutcome::Retryable(error.to_string()),
        }
    }

    async fn publish_live(&self, event: &LogEvent) {
        let Some(event_bus) = &self.event_bus else {
            return;
        };

        if let Err(error) = event_bus.publish(event).await {
            warn!(
                deployment_id = %event.deployment_id(),
                event_id = %event.event_id(),
                error = %error,
                "failed to forward log event to live viewers"
            );
        }
    }
}

async fn commit_resolved(
    consumer: &dyn TopicConsumer,
    resolved: &mut Vec<TopicOffset>,
    report: &mut BatchReport,
) {
    if resolved.is_empty() {
        return;
    }

    let offsets = std::mem::take(resolved);
    match consumer.commit(&offsets).await {
        Ok(()) => {
            debug!(count = offsets.len(), "committed log offsets");
            report.committed.extend(offsets);
        }
        Err(error) => {
            report.commit_failures += offsets.len();
            warn!(
                count = offsets.len(),
                error = %error,
                "failed to commit log offsets; messages will be redelivered"
            );
        }
    }
}
