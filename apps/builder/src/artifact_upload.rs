use std::path::{Path, PathBuf};

use shipyard_application::{ArtifactStore, LogLineSender};
use shipyard_core::{AppError, AppResult, ProjectId};
use shipyard_domain::BuildMarker;
use tracing::info;

/// Returns every regular file below `root` as sorted `/`-separated relative paths.
pub async fn collect_files(root: &Path) -> AppResult<Vec<String>> {
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];
    let mut files = Vec::new();

    while let Some(directory) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&directory).await.map_err(|error| {
            AppError::Validation(format!(
                "cannot read build output directory '{}': {error}",
                directory.display()
            ))
        })?;

        while let Some(entry) = entries.next_entry().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to list '{}': {error}",
                directory.display()
            ))
        })? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|error| {
                AppError::Internal(format!("failed to inspect '{}': {error}", path.display()))
            })?;

            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                files.push(relative_key(root, &path)?);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Uploads every file of `output_dir` to `__outputs/<projectId>/<file>`.
///
/// Each upload is framed by `Uploading <file>` and `Uploaded <file>` lines.
pub async fn upload_artifacts(
    store: &dyn ArtifactStore,
    project_id: &ProjectId,
    output_dir: &Path,
    lines: &LogLineSender,
) -> AppResult<usize> {
    lines.send(BuildMarker::UploadStarted.to_string()).await?;
    let files = collect_files(output_dir).await?;

    for file in &files {
        lines
            .send(BuildMarker::Uploading(file.clone()).to_string())
            .await?;

        let body = tokio::fs::read(output_dir.join(file)).await.map_err(|error| {
            AppError::Internal(format!("failed to read artifact '{file}': {error}"))
        })?;
        store
            .put_artifact(artifact_key(project_id, file).as_str(), body)
            .await?;

        lines
            .send(BuildMarker::Uploaded(file.clone()).to_string())
            .await?;
    }

    info!(project_id = %project_id, count = files.len(), "artifacts uploaded");
    Ok(files.len())
}

pub fn artifact_key(project_id: &ProjectId, file: &str) -> String {
    format!("__outputs/{project_id}/{file}")
}

fn relative_key(root: &Path, path: &Path) -> AppResult<String> {
    let relative = path.strip_prefix(root).map_err(|error| {
        AppError::Internal(format!("'{}' is outside the output directory: {error}", path.display()))
    })?;

    Ok(relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/"))
}
