use std::sync::Arc;

use shipyard_core::{AppResult, DeploymentId};
use shipyard_domain::LogEvent;

use crate::log_ports::LogEventRepository;

/// Read side of the log store.
#[derive(Clone)]
pub struct LogQueryService {
    repository: Arc<dyn LogEventRepository>,
}

impl LogQueryService {
    /// Creates a query service.
    #[must_use]
    pub fn new(repository: Arc<dyn LogEventRepository>) -> Self {
        Self { repository }
    }

    /// Returns every stored event of one deployment in arrival order.
    ///
    /// The id is matched exactly. Ids that no stored event can carry (blank
    /// or padded with whitespace) yield an empty list like unknown ones.
    pub async fn get_logs(&self, deployment_id: &str) -> AppResult<Vec<LogEvent>> {
        let Ok(deployment) = DeploymentId::new(deployment_id) else {
            return Ok(Vec::new());
        };
        if deployment.as_str() != deployment_id {
            return Ok(Vec::new());
        }

        self.repository.list_events_for_deployment(&deployment).await
    }
}

#[cfg(test)]
mod tests;
