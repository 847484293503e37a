use std::sync::Arc;
use std::time::Duration;

use shipyard_core::{AppError, AppResult, DeploymentId, ProjectId};
use shipyard_domain::{BuildMarker, LogMessage};
use tracing::{debug, warn};

use crate::topic_ports::{PublishReceipt, TopicPublisher};

mod shipper;

pub use shipper::{LogLineSender, LogShipper, ShippingReport};

/// Timeout and retry bounds applied to every publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishPolicy {
    /// Upper bound for one publish attempt.
    pub attempt_timeout: Duration,
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Wait before the second attempt; doubled after each retry.
    pub initial_backoff: Duration,
    /// Cap for the doubled backoff.
    pub max_backoff: Duration,
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(5),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl PublishPolicy {
    fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Publishes the output lines of one deployment to the log topic.
///
/// Every message is keyed by the deployment id so the lines of one
/// deployment stay ordered within a single partition while independent
/// deployments spread across partitions.
#[derive(Clone)]
pub struct LogPublisher {
    publisher: Arc<dyn TopicPublisher>,
    project_id: ProjectId,
    deployment_id: DeploymentId,
    policy: PublishPolicy,
}

impl LogPublisher {
    /// Creates a publisher for one deployment.
    pub fn new(
        publisher: Arc<dyn TopicPublisher>,
        project_id: ProjectId,
        deployment_id: DeploymentId,
        policy: PublishPolicy,
    ) -> AppResult<Self> {
        if policy.max_attempts == 0 {
            return Err(AppError::Validation(
                "publish max_attempts must be greater than zero".to_owned(),
            ));
        }

        if policy.attempt_timeout.is_zero() {
            return Err(AppError::Validation(
                "publish attempt timeout must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            publisher,
            project_id,
            deployment_id,
            policy,
        })
    }

    /// Returns the deployment these lines belong to.
    #[must_use]
    pub fn deployment_id(&self) -> &DeploymentId {
        &self.deployment_id
    }

    /// Publishes one lifecycle marker.
    pub async fn publish_marker(&self, marker: &BuildMarker) -> AppResult<PublishReceipt> {
        self.publish(marker.to_string().as_str()).await
    }

    /// Publishes one output line, retrying transient failures.
    ///
    /// The last error is returned once the attempts are exhausted; the
    /// caller decides whether that is fatal.
    pub async fn publish(&self, line: &str) -> AppResult<PublishReceipt> {
        let payload = LogMessage::new(
            self.project_id.clone(),
            self.deployment_id.clone(),
            line,
        )
        .to_json()?;
        let key = self.deployment_id.as_str();

        let mut attempt = 1;
        loop {
            let result = tokio::time::timeout(
                self.policy.attempt_timeout,
                self.publisher.publish(key, payload.clone()),
            )
            .await
            .unwrap_or_else(|_| {
                Err(AppError::Unavailable(format!(
                    "log publish timed out after {} ms",
                    self.policy.attempt_timeout.as_millis()
                )))
            });

            let error = match result {
                Ok(receipt) => {
                    debug!(
                        deployment_id = %self.deployment_id,
                        partition = receipt.offset.partition.index(),
                        offset = %receipt.offset.position,
                        "log line published"
                    );
                    return Ok(receipt);
                }
                Err(error) => error,
            };

            if !error.is_transient() || attempt >= self.policy.max_attempts {
                return Err(error);
            }

            let backoff = self.policy.backoff_for(attempt);
            warn!(
                deployment_id = %self.deployment_id,
                attempt,
                backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "log publish failed, retrying"
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    /// Waits until the topic acknowledged every publish.
    pub async fn flush(&self) -> AppResult<()> {
        tokio::time::timeout(self.policy.attempt_timeout, self.publisher.flush())
            .await
            .unwrap_or_else(|_| {
                Err(AppError::Unavailable(
                    "log publisher flush timed out".to_owned(),
                ))
            })
    }
}

#[cfg(test)]
mod tests;
