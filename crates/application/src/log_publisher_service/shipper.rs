use std::sync::Arc;

use shipyard_core::{AppError, AppResult};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use super::LogPublisher;

/// Outcome of shipping a stream of output lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingReport {
    /// Lines acknowledged by the topic.
    pub published: u64,
    /// Lines that exhausted their publish attempts.
    pub failed: u64,
    /// First publish error, if any.
    pub first_error: Option<String>,
}

impl ShippingReport {
    /// Returns true when every line was published.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Cloneable handle used by output readers to enqueue lines.
#[derive(Clone)]
pub struct LogLineSender {
    sender: mpsc::Sender<String>,
}

impl LogLineSender {
    /// Enqueues one line, waiting while the queue is full.
    pub async fn send(&self, line: impl Into<String>) -> AppResult<()> {
        self.sender.send(line.into()).await.map_err(|_| {
            AppError::Conflict("log shipper is already finished".to_owned())
        })
    }
}

/// Bounded queue plus a single publishing task.
///
/// Lines are published one at a time in queue order. When the topic
/// slows down the queue fills and `LogLineSender::send` waits, which in
/// turn stops the readers draining the build output.
pub struct LogShipper {
    sender: LogLineSender,
    publisher: Arc<LogPublisher>,
    task: JoinHandle<ShippingReport>,
}

impl LogShipper {
    /// Starts the publishing task with a queue of `capacity` lines.
    pub fn spawn(publisher: Arc<LogPublisher>, capacity: usize) -> AppResult<Self> {
        if capacity == 0 {
            return Err(AppError::Validation(
                "log shipper capacity must be greater than zero".to_owned(),
            ));
        }

        let (sender, receiver) = mpsc::channel(capacity);
        let task = tokio::spawn(ship_lines(publisher.clone(), receiver));

        Ok(Self {
            sender: LogLineSender { sender },
            publisher,
            task,
        })
    }

    /// Returns a sender for one output reader.
    #[must_use]
    pub fn sender(&self) -> LogLineSender {
        self.sender.clone()
    }

    /// Closes the queue, publishes every queued line and flushes.
    ///
    /// Senders handed out by [`LogShipper::sender`] must be dropped first,
    /// otherwise this waits for them.
    pub async fn finish(self) -> AppResult<ShippingReport> {
        let Self {
            sender,
            publisher,
            task,
        } = self;
        drop(sender);

        let report = task.await.map_err(|error| {
            AppError::Internal(format!("log shipping task failed: {error}"))
        })?;
        publisher.flush().await?;

        Ok(report)
    }
}

async fn ship_lines(
    publisher: Arc<LogPublisher>,
    mut receiver: mpsc::Receiver<String>,
) -> ShippingReport {
    let mut report = ShippingReport::default();

    while let Some(line) = receiver.recv().await {
        match publisher.publish(line.as_str()).await {
            Ok(_) => report.published += 1,
            Err(error) => {
                warn!(
                    deployment_id = %publisher.deployment_id(),
                    error = %error,
                    "dropping log line after failed publish"
                );
                report.failed += 1;
                if report.first_error.is_none() {
                    report.first_error = Some(error.to_string());
                }
            }
        }
    }

    report
}
