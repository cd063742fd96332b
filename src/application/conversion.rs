//! Conversion lifecycle: validate, render, persist, link.

use std::{sync::Arc, time::Duration, time::Instant};

use bytes::Bytes;
use metrics::{counter, histogram};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{error, info, warn};
use url::Url;

use crate::{
    application::{
        render::{PdfRenderer, RenderError},
        storage::{ArtifactStore, StorageError},
    },
    domain::{
        conversion::{ConversionRequest, ConversionResult, download_url},
        error::DomainError,
        filename::SanitizedFilename,
    },
};

const SOURCE: &str = "application::conversion";

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error(transparent)]
    BadRequest(#[from] DomainError),
    #[error("Conversion failed: {0}")]
    Render(#[from] RenderError),
    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),
}

impl ConversionError {
    /// Stable label distinguishing the three failure classes.
    pub fn kind(&self) -> &'static str {
        match self {
            ConversionError::BadRequest(_) => "bad_request",
            ConversionError::Render(_) => "render_failure",
            ConversionError::Storage(_) => "storage_failure",
        }
    }
}

/// Errors returned when serving a stored artifact.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("file not found")]
    NotFound,
    #[error(transparent)]
    Storage(StorageError),
}

/// Runs one conversion per call; calls are independent and may overlap.
pub struct ConversionService {
    renderer: Arc<dyn PdfRenderer>,
    store: Arc<dyn ArtifactStore>,
    render_timeout: Duration,
}

impl ConversionService {
    pub fn new(
        renderer: Arc<dyn PdfRenderer>,
        store: Arc<dyn ArtifactStore>,
        render_timeout: Duration,
    ) -> Self {
        Self {
            renderer,
            store,
            render_timeout,
        }
    }

    pub fn backend(&self) -> &'static str {
        self.renderer.backend()
    }

    /// Validate the raw request fields, render the Markdown and store the PDF,
    /// returning the download location.
    ///
    /// Nothing is written to storage unless rendering succeeded, and the write
    /// itself is atomic, so any error leaves storage as it was.
    pub async fn submit(
        &self,
        markdown: Option<String>,
        file_name: Option<String>,
        public_base: &Url,
    ) -> Result<ConversionResult, ConversionError> {
        let started_at = Instant::now();
        let result = match ConversionRequest::parse(markdown, file_name) {
            Ok(request) => self.run(request, public_base).await,
            Err(err) => Err(err.into()),
        };
        self.observe(started_at, &result);
        result
    }

    /// Count a request that was rejected before it could be parsed.
    pub fn record_rejection(&self) {
        counter!("md2pdf_conversions_total", "outcome" => "bad_request").increment(1);
    }

    fn observe(&self, started_at: Instant, result: &Result<ConversionResult, ConversionError>) {
        let outcome = match result {
            Ok(_) => "success",
            Err(err) => err.kind(),
        };
        counter!("md2pdf_conversions_total", "outcome" => outcome).increment(1);

        match result {
            Ok(converted) => info!(
                target = SOURCE,
                backend = self.backend(),
                file_name = %converted.file_name,
                pdf_bytes = converted.size_bytes,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "conversion succeeded"
            ),
            Err(err @ ConversionError::BadRequest(_)) => warn!(
                target = SOURCE,
                error_kind = err.kind(),
                error = %err,
                "conversion rejected"
            ),
            Err(err) => error!(
                target = SOURCE,
                backend = self.backend(),
                error_kind = err.kind(),
                error = %err,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "conversion failed"
            ),
        }
    }

    async fn run(
        &self,
        request: ConversionRequest,
        public_base: &Url,
    ) -> Result<ConversionResult, ConversionError> {
        let file_name = request.sanitized_name()?;
        let rendered = self.render(&request.markdown).await?;
        let size_bytes = rendered.len();
        self.store.put(&file_name, rendered).await?;

        Ok(ConversionResult {
            url: download_url(public_base, &file_name),
            file_name,
            size_bytes,
        })
    }

    async fn render(&self, markdown: &str) -> Result<Bytes, RenderError> {
        let started_at = Instant::now();
        let rendered = timeout(self.render_timeout, self.renderer.render(markdown))
            .await
            .map_err(|_| RenderError::TimedOut {
                timeout: self.render_timeout,
            })?;

        histogram!("md2pdf_render_ms", "backend" => self.backend())
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        rendered
    }

    /// Load a stored artifact by the literal name taken from a download URL.
    pub async fn fetch(&self, name: &str) -> Result<(SanitizedFilename, Bytes), RetrievalError> {
        let result = match SanitizedFilename::from_stored(name) {
            Some(file_name) => match self.store.get(&file_name).await {
                Ok(bytes) => Ok((file_name, bytes)),
                Err(StorageError::NotFound) => Err(RetrievalError::NotFound),
                Err(err) => Err(RetrievalError::Storage(err)),
            },
            None => Err(RetrievalError::NotFound),
        };

        let outcome = match &result {
            Ok(_) => "hit",
            Err(RetrievalError::NotFound) => "miss",
            Err(RetrievalError::Storage(_)) => "error",
        };
        counter!("md2pdf_downloads_total", "outcome" => outcome).increment(1);

        result
    }
}
