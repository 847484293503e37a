use std::path::PathBuf;

use shipyard_application::{ArtifactStore, LogLineSender, LogShipper, ShippingReport};
use shipyard_core::{AppResult, ProjectId};
use shipyard_domain::BuildMarker;
use tracing::warn;

use crate::artifact_upload::upload_artifacts;
use crate::build_process::{BuildOutcome, run_build};

/// What to build and where its output lands.
#[derive(Debug, Clone)]
pub struct BuildJob {
    pub project_id: ProjectId,
    pub build_dir: PathBuf,
    pub build_command: String,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub build: BuildOutcome,
    pub uploaded: usize,
    pub shipping: ShippingReport,
}

/// Runs the build, uploads its output and ships every line.
///
/// The shipper is always finished, so every queued line is published and
/// flushed before this returns, even when the build itself errored.
pub async fn run_build_job(
    job: &BuildJob,
    shipper: LogShipper,
    artifacts: Option<&dyn ArtifactStore>,
) -> AppResult<BuildSummary> {
    let sender = shipper.sender();
    let result = ship_build(job, &sender, artifacts).await;
    drop(sender);

    let shipping = shipper.finish().await?;
    let (build, uploaded) = result?;

    Ok(BuildSummary {
        build,
        uploaded,
        shipping,
    })
}

async fn ship_build(
    job: &BuildJob,
    lines: &LogLineSender,
    artifacts: Option<&dyn ArtifactStore>,
) -> AppResult<(BuildOutcome, usize)> {
    lines.send(BuildMarker::Started.to_string()).await?;
    let build = run_build(job.build_command.as_str(), &job.build_dir, lines.clone()).await?;
    lines.send(BuildMarker::Complete.to_string()).await?;

    let uploaded = match artifacts {
        Some(store) if build.success => {
            upload_artifacts(store, &job.project_id, &job.output_dir, lines).await?
        }
        Some(_) => {
            warn!(outcome = %build.describe(), "skipping artifact upload after failed build");
            0
        }
        None => 0,
    };

    lines.send(BuildMarker::Done.to_string()).await?;
    Ok((build, uploaded))
}
