use std::fmt::{Display, Formatter};

use shipyard_core::{AppError, AppResult, DeploymentId};

const MAX_CHANNEL_NAME_LENGTH: usize = 256;

/// Name of a fanout channel viewers subscribe to.
///
/// Channels are ephemeral: they exist only while at least one connection
/// is joined.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelName(String);

impl ChannelName {
    /// Validates a client supplied channel name.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "channel name must not be empty".to_owned(),
            ));
        }

        if trimmed.len() > MAX_CHANNEL_NAME_LENGTH {
            return Err(AppError::Validation(format!(
                "channel name must be at most {MAX_CHANNEL_NAME_LENGTH} bytes"
            )));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the live-log channel for one deployment, `<prefix>:<deployment>`.
    #[must_use]
    pub fn for_deployment(prefix: &str, deployment_id: &DeploymentId) -> Self {
        Self(format!("{prefix}:{deployment_id}"))
    }

    /// Returns the channel name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ChannelName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use shipyard_core::DeploymentId;

    use super::ChannelName;

    #[test]
    fn channel_name_rejects_blank_and_oversized() {
        assert!(ChannelName::new("  ").is_err());
        assert!(ChannelName::new("x".repeat(257)).is_err());
        assert_eq!(
            ChannelName::new(" deploy-D1 ")
                .map(|channel| channel.to_string())
                .unwrap_or_default(),
            "deploy-D1"
        );
    }

    #[test]
    fn deployment_channel_uses_prefix() {
        let deployment_id = DeploymentId::new("D1").unwrap_or_else(|_| unreachable!());
        assert_eq!(
            ChannelName::for_deployment("logs", &deployment_id).as_str(),
            "logs:D1"
        );
    }
}
