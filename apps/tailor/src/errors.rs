use thiserror::Error;

use crate::render::RenderError;

/// Top-level error type for a pipeline run.
///
/// Each variant maps to one category of the failure taxonomy and carries a
/// distinct process exit code. Upload failures are deliberately absent from
/// the fatal set: they are reported as warnings and never fail a run that
/// already produced its StructuredResume and artifacts.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or invalid required inputs. Aborts before any stage runs.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The external generation collaborator failed validation or exhausted
    /// retries. Checkpoints written up to this point remain on disk.
    #[error("Stage '{stage}' failed: {message}")]
    Stage {
        stage: &'static str,
        message: String,
    },

    /// The StructuredResume could not be mapped onto the selected backend,
    /// or in-process compilation failed. The resume checkpoint survives.
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    /// Process exit code for this error category.
    /// 0 is reserved for success (including runs with upload warnings).
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Configuration(_) => 1,
            PipelineError::Stage { .. } => 2,
            PipelineError::Render(_) => 3,
            PipelineError::Internal(_) => 1,
        }
    }

    pub fn stage(stage: &'static str, message: impl Into<String>) -> Self {
        PipelineError::Stage {
            stage,
            message: message.into(),
        }
    }
}
