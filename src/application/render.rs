//! Renderer capability: Markdown in, PDF bytes out.
//!
//! The conversion service only sees this trait. Concrete toolchains live in
//! [`crate::infra::render`]; tests inject their own doubles.

use std::{io, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Leading bytes of every PDF document.
pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// Failure reported by a renderer. Messages carry the toolchain diagnostic
/// verbatim so it can be surfaced to the caller.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{program} is not available: {source}")]
    Unavailable {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("{program} produced no output")]
    EmptyOutput { program: String },
    #[error("renderer output is not a PDF")]
    NotPdf,
    #[error("renderer timed out after {timeout:?}")]
    TimedOut { timeout: Duration },
    #[error("failed to build HTML document: {message}")]
    Document { message: String },
    #[error("renderer I/O failed: {0}")]
    Io(#[from] io::Error),
}

impl RenderError {
    pub fn document(message: impl Into<String>) -> Self {
        Self::Document {
            message: message.into(),
        }
    }
}

/// Turns Markdown into a complete PDF document.
///
/// Implementations are all-or-nothing: either the full document is returned
/// or an error is, never partial output.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    /// Short backend label used in logs and metrics.
    fn backend(&self) -> &'static str;

    async fn render(&self, markdown: &str) -> Result<Bytes, RenderError>;
}

/// Check that renderer output looks like a PDF document.
pub fn ensure_pdf(bytes: &[u8]) -> Result<(), RenderError> {
    if bytes.starts_with(PDF_MAGIC) {
        Ok(())
    } else {
        Err(RenderError::NotPdf)
    }
}
