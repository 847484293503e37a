//! Shipyard builder: runs one deployment build and ships its output.

#![forbid(unsafe_code)]

mod artifact_upload;
mod build_job;
mod build_process;
mod builder_config;

use std::sync::Arc;

use shipyard_application::{ArtifactStore, LogPublisher, LogShipper, TopicDescriptor};
use shipyard_core::AppError;
use shipyard_infrastructure::{
    ObjectStoreArtifactStore, RedisStreamPublisher, connect_topic_connection,
};
use tracing::{info, warn};

use crate::build_job::{BuildJob, run_build_job};
use crate::builder_config::{BuilderConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = BuilderConfig::load()?;
    let redis_client = redis::Client::open(config.redis_url.as_str())
        .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;

    let descriptor = TopicDescriptor::new(config.topic.clone(), config.topic_partitions)?;
    let connection = connect_topic_connection(redis_client).await?;
    let mut topic = RedisStreamPublisher::new(connection, descriptor);
    if let Some(max_len) = config.topic_max_len {
        topic = topic.with_max_len(max_len);
    }

    let publisher = LogPublisher::new(
        Arc::new(topic),
        config.project_id.clone(),
        config.deployment_id.clone(),
        config.publish_policy,
    )?;
    let shipper = LogShipper::spawn(Arc::new(publisher), config.log_channel_capacity)?;

    let artifacts = match config.artifact_store_url.as_deref() {
        Some(location) => Some(ObjectStoreArtifactStore::from_location(location).await?),
        None => {
            warn!("ARTIFACT_STORE_URL is not set, build output will not be uploaded");
            None
        }
    };

    info!(
        project_id = %config.project_id,
        deployment_id = %config.deployment_id,
        build_dir = %config.build_dir.display(),
        topic = %config.topic,
        "shipyard-builder started"
    );

    let job = BuildJob {
        project_id: config.project_id.clone(),
        build_dir: config.build_dir.clone(),
        build_command: config.build_command.clone(),
        output_dir: config.output_dir.clone(),
    };
    let summary = run_build_job(
        &job,
        shipper,
        artifacts.as_ref().map(|store| store as &dyn ArtifactStore),
    )
    .await?;

    if !summary.shipping.is_complete() {
        let message = format!(
            "{} of {} log lines were not published: {}",
            summary.shipping.failed,
            summary.shipping.failed + summary.shipping.published,
            summary.shipping.first_error.as_deref().unwrap_or("unknown error")
        );
        if config.fail_on_publish_error {
            return Err(AppError::Unavailable(message));
        }
        warn!(deployment_id = %config.deployment_id, "{message}");
    }

    if !summary.build.success {
        return Err(AppError::Internal(format!(
            "build command failed with {}",
            summary.build.describe()
        )));
    }

    info!(
        deployment_id = %config.deployment_id,
        published = summary.shipping.published,
        uploaded = summary.uploaded,
        "shipyard-builder finished"
    );
    Ok(())
}
