//! UploadDispatcher — hands finished artifacts to an external uploader.
//!
//! Uploaders are collaborators outside the core: this module only defines
//! the contract and the dispatch rule that upload failures never unwind an
//! already-successful run. A failed upload is logged, collected into the
//! summary, and reported as a warning at exit.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::render::RenderArtifact;

/// External upload collaborator. Given a finished artifact, report success
/// or failure; implementations own their own credentials and retries.
#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    async fn upload(&self, artifact: &RenderArtifact) -> Result<(), String>;
}

/// Default uploader: keeps artifacts local and does nothing. Useful when a
/// run's output directory is the destination.
pub struct NoopUploader;

#[async_trait]
impl ArtifactUploader for NoopUploader {
    async fn upload(&self, artifact: &RenderArtifact) -> Result<(), String> {
        debug!("No uploader configured, keeping {}", artifact.path.display());
        Ok(())
    }
}

/// Outcome of dispatching a run's artifacts.
#[derive(Debug, Default)]
pub struct UploadSummary {
    pub attempted: usize,
    pub failed: Vec<(PathBuf, String)>,
}

impl UploadSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct UploadDispatcher {
    uploader: Arc<dyn ArtifactUploader>,
}

impl UploadDispatcher {
    pub fn new(uploader: Arc<dyn ArtifactUploader>) -> Self {
        Self { uploader }
    }

    /// Uploads each artifact in turn. Failures are collected, never
    /// propagated — by the time artifacts exist the run has already
    /// succeeded, and an upload problem must not change that.
    pub async fn dispatch(&self, artifacts: &[RenderArtifact]) -> UploadSummary {
        let mut summary = UploadSummary::default();
        for artifact in artifacts {
            summary.attempted += 1;
            if let Err(reason) = self.uploader.upload(artifact).await {
                warn!(
                    "Upload failed for {} ({reason}) — run is still successful",
                    artifact.path.display()
                );
                summary.failed.push((artifact.path.clone(), reason));
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{ArtifactKind, BackendKind};

    struct AlwaysFails;

    #[async_trait]
    impl ArtifactUploader for AlwaysFails {
        async fn upload(&self, _artifact: &RenderArtifact) -> Result<(), String> {
            Err("bucket on fire".to_string())
        }
    }

    fn artifact(name: &str) -> RenderArtifact {
        RenderArtifact {
            kind: ArtifactKind::SourceMarkup,
            backend: BackendKind::Latex,
            path: PathBuf::from(name),
        }
    }

    #[tokio::test]
    async fn test_upload_failures_are_collected_not_propagated() {
        let dispatcher = UploadDispatcher::new(Arc::new(AlwaysFails));
        let summary = dispatcher
            .dispatch(&[artifact("a.tex"), artifact("b.pdf")])
            .await;

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.failed.len(), 2);
        assert!(!summary.is_clean());
        assert_eq!(summary.failed[0].1, "bucket on fire");
    }

    #[tokio::test]
    async fn test_noop_uploader_is_clean() {
        let dispatcher = UploadDispatcher::new(Arc::new(NoopUploader));
        let summary = dispatcher.dispatch(&[artifact("a.tex")]).await;
        assert_eq!(summary.attempted, 1);
        assert!(summary.is_clean());
    }
}
