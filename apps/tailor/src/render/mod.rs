//! Render backends — turn a StructuredResume into typeset artifacts.
//!
//! Backend selection is a closed tag (`BackendKind`) resolved once per run.
//! Both backends share the structured-to-markup transform in
//! `render::markup`, so the markup-only and compiled paths can never
//! diverge on content.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::models::resume::StructuredResume;

pub mod markup;
pub mod pdf;

#[derive(Debug, Error)]
pub enum RenderError {
    /// A field the backend requires is absent or empty. Content is never
    /// silently omitted.
    #[error("StructuredResume is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Unknown template '{0}'")]
    UnknownTemplate(String),

    /// In-process compilation to the final document failed.
    #[error("Document compilation failed: {0}")]
    Compile(String),

    #[error("Failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// What kind of output an artifact is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    SourceMarkup,
    CompiledDocument,
}

/// The selected renderer. Closed set: adding a backend means adding a
/// variant and an implementation, not a new string constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    Latex,
    MarkupPdf,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Latex => "latex",
            BackendKind::MarkupPdf => "markup-pdf",
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latex" => Ok(BackendKind::Latex),
            "pdf" | "markup-pdf" => Ok(BackendKind::MarkupPdf),
            other => Err(format!(
                "Unknown backend '{other}' (expected 'latex' or 'pdf')"
            )),
        }
    }
}

/// One terminal output of rendering. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderArtifact {
    pub kind: ArtifactKind,
    pub backend: BackendKind,
    pub path: PathBuf,
}

/// The polymorphic renderer contract. Both implementations accept the same
/// StructuredResume shape; a malformed resume is a RenderError, never a
/// silently thinner document.
pub trait RenderBackend {
    fn kind(&self) -> BackendKind;

    fn render(
        &self,
        resume: &StructuredResume,
        template: &str,
        out_dir: &Path,
    ) -> Result<Vec<RenderArtifact>, RenderError>;
}

/// Resolves the implementation for a selected backend tag.
pub fn backend_for(kind: BackendKind) -> Box<dyn RenderBackend> {
    match kind {
        BackendKind::Latex => Box::new(LatexBackend),
        BackendKind::MarkupPdf => Box::new(pdf::MarkupPdfBackend),
    }
}

/// Markup-only backend: emits exactly one source-markup artifact and never
/// invokes a compiler — typesetting to a final document is a downstream
/// concern.
pub struct LatexBackend;

impl RenderBackend for LatexBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Latex
    }

    fn render(
        &self,
        resume: &StructuredResume,
        template: &str,
        out_dir: &Path,
    ) -> Result<Vec<RenderArtifact>, RenderError> {
        let source = markup::to_latex(resume, template)?;
        let path = out_dir.join(format!("{}.tex", markup::slugify(resume)));
        write_text_atomic(&path, &source)?;

        Ok(vec![RenderArtifact {
            kind: ArtifactKind::SourceMarkup,
            backend: BackendKind::Latex,
            path,
        }])
    }
}

/// Atomic text write shared by both backends.
pub(crate) fn write_text_atomic(path: &Path, contents: &str) -> Result<(), RenderError> {
    write_bytes_atomic(path, contents.as_bytes())
}

pub(crate) fn write_bytes_atomic(path: &Path, contents: &[u8]) -> Result<(), RenderError> {
    let to_write_err = |source| RenderError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().ok_or_else(|| RenderError::Write {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "no parent directory"),
    })?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(to_write_err)?;
    tmp.write_all(contents).map_err(to_write_err)?;
    tmp.flush().map_err(to_write_err)?;
    tmp.persist(path).map_err(|e| to_write_err(e.error))?;
    Ok(())
}
