use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use shipyard_application::PublishPolicy;
use shipyard_core::{AppError, AppResult, DeploymentId, ProjectId};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct BuilderConfig {
    pub project_id: ProjectId,
    pub deployment_id: DeploymentId,
    pub redis_url: String,
    pub topic: String,
    pub topic_partitions: u32,
    pub topic_max_len: Option<u64>,
    pub build_dir: PathBuf,
    pub build_command: String,
    pub output_dir: PathBuf,
    pub artifact_store_url: Option<String>,
    pub publish_policy: PublishPolicy,
    pub log_channel_capacity: usize,
    pub fail_on_publish_error: bool,
}

impl BuilderConfig {
    pub fn load() -> AppResult<Self> {
        let project_id = ProjectId::new(required_env("PROJECT_ID")?)?;
        let deployment_id = DeploymentId::new(required_env("DEPLOYMENT_ID")?)?;
        let redis_url = required_env("REDIS_URL")?;
        let topic = optional_env("LOG_TOPIC").unwrap_or_else(|| "container-logs".to_owned());
        let topic_partitions = parse_env("LOG_TOPIC_PARTITIONS", 8_u32)?;
        let topic_max_len = optional_env("LOG_TOPIC_MAX_LEN")
            .map(|value| parse_value::<u64>("LOG_TOPIC_MAX_LEN", value.as_str()))
            .transpose()?;
        let build_dir =
            PathBuf::from(optional_env("BUILD_DIR").unwrap_or_else(|| "./output".to_owned()));
        let build_command = optional_env("BUILD_COMMAND")
            .unwrap_or_else(|| "npm install && npm run build".to_owned());
        let output_dir = optional_env("BUILD_OUTPUT_DIR")
            .map_or_else(|| build_dir.join("dist"), PathBuf::from);
        let artifact_store_url = optional_env("ARTIFACT_STORE_URL");
        let publish_timeout_ms = parse_env("PUBLISH_TIMEOUT_MS", 5000_u64)?;
        let publish_max_attempts = parse_env("PUBLISH_MAX_ATTEMPTS", 3_u32)?;
        let publish_backoff_ms = parse_env("PUBLISH_BACKOFF_MS", 200_u64)?;
        let log_channel_capacity = parse_env("LOG_CHANNEL_CAPACITY", 1024_usize)?;
        let fail_on_publish_error = parse_env("FAIL_ON_PUBLISH_ERROR", false)?;

        if topic_partitions == 0 {
            return Err(AppError::Validation(
                "LOG_TOPIC_PARTITIONS must be greater than zero".to_owned(),
            ));
        }

        if topic_max_len == Some(0) {
            return Err(AppError::Validation(
                "LOG_TOPIC_MAX_LEN must be greater than zero when set".to_owned(),
            ));
        }

        Ok(Self {
            project_id,
            deployment_id,
            redis_url,
            topic,
            topic_partitions,
            topic_max_len,
            build_dir,
            build_command,
            output_dir,
            artifact_store_url,
            publish_policy: publish_policy(
                publish_timeout_ms,
                publish_max_attempts,
                publish_backoff_ms,
            ),
            log_channel_capacity,
            fail_on_publish_error,
        })
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn publish_policy(timeout_ms: u64, max_attempts: u32, backoff_ms: u64) -> PublishPolicy {
    let defaults = PublishPolicy::default();
    let initial_backoff = Duration::from_millis(backoff_ms);

    PublishPolicy {
        attempt_timeout: Duration::from_millis(timeout_ms),
        max_attempts,
        initial_backoff,
        max_backoff: defaults.max_backoff.max(initial_backoff),
    }
}

fn required_env(name: &str) -> AppResult<String> {
    optional_env(name).ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parse_env<T>(name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(name) {
        Some(value) => parse_value(name, value.as_str()),
        None => Ok(default),
    }
}

fn parse_value<T>(name: &str, value: &str) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|error| AppError::Validation(format!("invalid {name} value '{value}': {error}")))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{parse_value, publish_policy};

    #[test]
    fn publish_policy_keeps_backoff_cap_above_initial_backoff() {
        let policy = publish_policy(1000, 5, 10_000);

        assert_eq!(policy.attempt_timeout, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.max_backoff, Duration::from_secs(10));
    }

    #[test]
    fn boolean_flags_parse() {
        assert_eq!(parse_value::<bool>("FAIL_ON_PUBLISH_ERROR", " true ").ok(), Some(true));
        assert!(parse_value::<bool>("FAIL_ON_PUBLISH_ERROR", "yes").is_err());
    }
}
