use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use shipyard_application::LogEventRepository;
use shipyard_core::{AppResult, DeploymentId, EventId};
use shipyard_domain::LogEvent;

#[derive(Debug, Default)]
struct StoredEvents {
    ids: HashSet<EventId>,
    events: Vec<LogEvent>,
}

/// In-memory insert-only log event store.
#[derive(Debug, Default)]
pub struct InMemoryLogEventRepository {
    state: RwLock<StoredEvents>,
}

impl InMemoryLogEventRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored events across all deployments.
    pub async fn len(&self) -> usize {
        self.state.read().await.events.len()
    }

    /// Returns whether no event is stored.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.events.is_empty()
    }
}

#[async_trait]
impl LogEventRepository for InMemoryLogEventRepository {
    async fn append_event(&self, event: &LogEvent) -> AppResult<bool> {
        let mut state = self.state.write().await;
        if !state.ids.insert(event.event_id()) {
            return Ok(false);
        }

        state.events.push(event.clone());
        Ok(true)
    }

    async fn list_events_for_deployment(
        &self,
        deployment_id: &DeploymentId,
    ) -> AppResult<Vec<LogEvent>> {
        let state = self.state.read().await;
        let mut events: Vec<LogEvent> = state
            .events
            .iter()
            .filter(|event| event.deployment_id() == deployment_id)
            .cloned()
            .collect();
        // Stable sort keeps insert order among equal timestamps.
        events.sort_by_key(LogEvent::timestamp);

        Ok(events)
    }
}
