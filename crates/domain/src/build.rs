use std::fmt::{Display, Formatter};

/// Lifecycle lines a build publishes around its captured output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildMarker {
    /// First line of every build.
    Started,
    /// Build command exited and its output was drained.
    Complete,
    /// Artifact upload is about to begin.
    UploadStarted,
    /// One artifact upload is in progress.
    Uploading(String),
    /// One artifact finished uploading.
    Uploaded(String),
    /// Last line of every build.
    Done,
}

impl Display for BuildMarker {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => formatter.write_str("Build Started..."),
            Self::Complete => formatter.write_str("Build Complete"),
            Self::UploadStarted => formatter.write_str("Starting to upload"),
            Self::Uploading(file) => write!(formatter, "Uploading {file}"),
            Self::Uploaded(file) => write!(formatter, "Uploaded {file}"),
            Self::Done => formatter.write_str("Done"),
        }
    }
}

/// Formats one standard-error line for publishing.
#[must_use]
pub fn stderr_line(line: &str) -> String {
    format!("error: {line}")
}

#[cfg(test)]
mod tests {
    use super::{BuildMarker, stderr_line};

    #[test]
    fn markers_render_stable_lines() {
        assert_eq!(BuildMarker::Started.to_string(), "Build Started...");
        assert_eq!(BuildMarker::Complete.to_string(), "Build Complete");
        assert_eq!(
            BuildMarker::Uploading("assets/index.js".to_owned()).to_string(),
            "Uploading assets/index.js"
        );
        assert_eq!(BuildMarker::Done.to_string(), "Done");
    }

    #[test]
    fn stderr_lines_are_prefixed() {
        assert_eq!(stderr_line("npm WARN deprecated"), "error: npm WARN deprecated");
    }
}
