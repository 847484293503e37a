mod consumer;
mod message;
mod publisher;

pub use consumer::TopicConsumer;
pub use message::{PublishReceipt, TopicDescriptor, TopicMessage, TopicOffset};
pub use publisher::TopicPublisher;
