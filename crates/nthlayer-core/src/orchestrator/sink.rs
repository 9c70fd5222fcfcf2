//! Artifact sinks: where `apply` writes its output.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::Artifact;
use crate::error::SinkError;

/// Destination for applied artifacts.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Write one artifact. Implementations classify failures as transient
    /// (caller retries) or permanent (caller aborts the artifact).
    async fn write(&self, artifact: &Artifact) -> Result<(), SinkError>;
}

/// Writes artifacts to the stable per-service directory layout:
/// `<root>/<service>/<kind filename>`. Content is UTF-8 with a trailing
/// newline; filenames are fixed per artifact kind.
pub struct FileSystemSink {
    root: PathBuf,
}

impl FileSystemSink {
    /// Create a sink rooted at `root`. The directory is created on demand.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path an artifact lands at.
    pub fn path_for(&self, artifact: &Artifact) -> PathBuf {
        self.root
            .join(&artifact.service)
            .join(artifact.kind.filename())
    }
}

#[async_trait]
impl ArtifactSink for FileSystemSink {
    async fn write(&self, artifact: &Artifact) -> Result<(), SinkError> {
        let path = self.path_for(artifact);
        let target = path.display().to_string();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| classify_io(&target, &e))?;
        }
        tokio::fs::write(&path, artifact.content.as_bytes())
            .await
            .map_err(|e| classify_io(&target, &e))?;

        debug!("[Sink] wrote {}", target);
        Ok(())
    }
}

/// Permission problems will not fix themselves; most other IO failures are
/// worth one more try.
fn classify_io(target: &str, error: &std::io::Error) -> SinkError {
    match error.kind() {
        std::io::ErrorKind::PermissionDenied => SinkError::Permanent {
            target: target.to_string(),
            message: error.to_string(),
        },
        _ => SinkError::Transient {
            target: target.to_string(),
            message: error.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ArtifactKind;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_writes_to_per_service_layout() {
        let dir = TempDir::new().unwrap();
        let sink = FileSystemSink::new(dir.path());
        let artifact = Artifact {
            kind: ArtifactKind::Dashboard,
            service: "checkout".to_string(),
            content: "{}\n".to_string(),
        };
        sink.write(&artifact).await.unwrap();

        let written = std::fs::read_to_string(
            dir.path().join("checkout").join("dashboard.json"),
        )
        .unwrap();
        assert_eq!(written, "{}\n");
    }

    #[tokio::test]
    async fn test_overwrites_existing_artifact() {
        let dir = TempDir::new().unwrap();
        let sink = FileSystemSink::new(dir.path());
        let mut artifact = Artifact {
            kind: ArtifactKind::SloRecord,
            service: "checkout".to_string(),
            content: "a\n".to_string(),
        };
        sink.write(&artifact).await.unwrap();
        artifact.content = "b\n".to_string();
        sink.write(&artifact).await.unwrap();

        let written =
            std::fs::read_to_string(dir.path().join("checkout").join("slo.yaml")).unwrap();
        assert_eq!(written, "b\n");
    }
}
