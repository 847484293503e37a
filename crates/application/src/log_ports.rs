use async_trait::async_trait;
use shipyard_core::{AppResult, DeploymentId};
use shipyard_domain::LogEvent;

/// Insert-only store of log events.
#[async_trait]
pub trait LogEventRepository: Send + Sync {
    /// Appends one event.
    ///
    /// Returns `false` when an event with the same id is already stored,
    /// in which case nothing is written.
    async fn append_event(&self, event: &LogEvent) -> AppResult<bool>;

    /// Lists every event of one deployment in arrival order.
    async fn list_events_for_deployment(
        &self,
        deployment_id: &DeploymentId,
    ) -> AppResult<Vec<LogEvent>>;
}

/// Internal bus carrying freshly stored events to live viewers.
#[async_trait]
pub trait LogEventBus: Send + Sync {
    /// Publishes one stored event. Delivery is best effort.
    async fn publish(&self, event: &LogEvent) -> AppResult<()>;
}
