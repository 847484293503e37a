use shipyard_domain::LogEvent;

use crate::topic_ports::TopicOffset;

/// Result of processing one topic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Stored as a new event.
    Ingested(LogEvent),
    /// The store already holds an event with the derived id.
    Duplicate,
    /// Store write failed; the message stays uncommitted.
    Retryable(String),
    /// Payload can never be decoded; the message is committed and skipped.
    Dropped(String),
}

/// Aggregated outcome of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Messages in the batch.
    pub received: usize,
    /// Messages stored as new events.
    pub ingested: usize,
    /// Redelivered messages already stored.
    pub duplicates: usize,
    /// Messages left for redelivery.
    pub retryable: usize,
    /// Undecodable messages skipped.
    pub dropped: usize,
    /// Offsets acknowledged to the topic.
    pub committed: Vec<TopicOffset>,
    /// Resolved messages whose commit failed.
    pub commit_failures: usize,
}
