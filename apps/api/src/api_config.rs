use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use shipyard_core::AppError;
use tracing_subscriber::EnvFilter;

/// Runtime configuration of the api process.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub redis_url: Option<String>,
    pub api_host: String,
    pub api_port: u16,
    pub cors_allowed_origin: Option<String>,
    pub fanout_connection_buffer: usize,
    pub live_log_channel_prefix: String,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = required_env("DATABASE_URL")?;
        let redis_url = optional_env("REDIS_URL");
        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = parse_env("API_PORT", 9000_u16)?;
        let cors_allowed_origin = optional_env("CORS_ALLOWED_ORIGIN");

        let fanout_connection_buffer = parse_env("FANOUT_CONNECTION_BUFFER", 256_usize)?;
        if fanout_connection_buffer == 0 {
            return Err(AppError::Validation(
                "FANOUT_CONNECTION_BUFFER must be greater than zero".to_owned(),
            ));
        }

        let live_log_channel_prefix =
            optional_env("LIVE_LOG_CHANNEL_PREFIX").unwrap_or_else(|| "logs".to_owned());

        Ok(Self {
            migrate_only,
            database_url,
            redis_url,
            api_host,
            api_port,
            cors_allowed_origin,
            fanout_connection_buffer,
            live_log_channel_prefix,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Validation(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
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

fn required_env(name: &str) -> Result<String, AppError> {
    let value = env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parse_env<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|error| AppError::Validation(format!("invalid {name} '{value}': {error}"))),
        None => Ok(default),
    }
}
