//! Application services and ports.

#![forbid(unsafe_code)]

mod artifact_ports;
mod ingestion_service;
mod log_ports;
mod log_publisher_service;
mod log_query_service;
mod topic_ports;

pub use artifact_ports::ArtifactStore;
pub use ingestion_service::{
    BatchReport, EventIdStrategy, IngestionSettings, LogIngestionService, MessageOutcome,
};
pub use log_ports::{LogEventBus, LogEventRepository};
pub use log_publisher_service::{
    LogLineSender, LogPublisher, LogShipper, PublishPolicy, ShippingReport,
};
pub use log_query_service::LogQueryService;
pub use topic_ports::{
    PublishReceipt, TopicConsumer, TopicDescriptor, TopicMessage, TopicOffset, TopicPublisher,
};
