use std::path::Path;
use std::process::Stdio;

use shipyard_application::LogLineSender;
use shipyard_core::{AppError, AppResult};
use shipyard_domain::stderr_line;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

/// Exit state of the build command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
}

impl BuildOutcome {
    pub fn describe(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "termination by signal".to_owned(),
        }
    }
}

/// Runs `command` through `sh -c` inside `working_dir`.
///
/// Standard output lines are forwarded verbatim and standard error lines
/// with an `error: ` prefix. Returns once the process exited and both
/// streams are drained into `lines`.
pub async fn run_build(
    command: &str,
    working_dir: &Path,
    lines: LogLineSender,
) -> AppResult<BuildOutcome> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to start build command in '{}': {error}",
                working_dir.display()
            ))
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Internal("build stdout is not captured".to_owned()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Internal("build stderr is not captured".to_owned()))?;

    let stdout_task = tokio::spawn(forward_lines(stdout, lines.clone(), str::to_owned));
    let stderr_task = tokio::spawn(forward_lines(stderr, lines, stderr_line));

    let status = child
        .wait()
        .await
        .map_err(|error| AppError::Internal(format!("failed to wait for build command: {error}")))?;

    for task in [stdout_task, stderr_task] {
        if let Err(error) = task.await {
            warn!(error = %error, "build output reader failed");
        }
    }

    let outcome = BuildOutcome {
        success: status.success(),
        exit_code: status.code(),
    };
    info!(success = outcome.success, exit_code = ?outcome.exit_code, "build command finished");

    Ok(outcome)
}

async fn forward_lines<R>(reader: R, lines: LogLineSender, format: fn(&str) -> String)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buffer = Vec::new();

    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer).await {
            Ok(0) => return,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buffer);
                let line = line.trim_end_matches(['\n', '\r']);
                if lines.send(format(line)).await.is_err() {
                    return;
                }
            }
            Err(error) => {
                warn!(error = %error, "failed to read build output");
                return;
            }
        }
    }
}
