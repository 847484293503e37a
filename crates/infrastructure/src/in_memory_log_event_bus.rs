use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;
use tracing::warn;

use shipyard_application::LogEventBus;
use shipyard_core::AppResult;
use shipyard_domain::LogEvent;

/// Process-local live log bus.
#[derive(Debug, Clone)]
pub struct InMemoryLogEventBus {
    sender: broadcast::Sender<LogEvent>,
}

impl InMemoryLogEventBus {
    /// Creates a bus keeping up to `capacity` undelivered events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns a stream of every event published after this call.
    #[must_use]
    pub fn subscribe(&self) -> BoxStream<'static, LogEvent> {
        let receiver = self.sender.subscribe();
        stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, receiver)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "live log subscriber lagged; events skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

#[async_trait]
impl LogEventBus for InMemoryLogEventBus {
    async fn publish(&self, event: &LogEvent) -> AppResult<()> {
        // No subscriber is not an error for a best effort bus.
        let _ = self.sender.send(event.clone());
        Ok(())
    }
}
