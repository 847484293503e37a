//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod build;
mod channel;
mod log_event;
mod partition;

pub use build::{BuildMarker, stderr_line};
pub use channel::ChannelName;
pub use log_event::{LogEvent, LogMessage};
pub use partition::{PartitionAssignment, TopicPartition};
