use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use md2pdf_api_types::ErrorBody;
use thiserror::Error;

use crate::{
    application::conversion::{ConversionError, RetrievalError},
    domain::error::DomainError,
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// An HTTP failure rendered as `{"error": ...}` with a diagnostic report for
/// the logging middleware.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: String,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message: public_message.into(),
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: impl Into<String>,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message: public_message.into(),
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn public_message(&self) -> &str {
        &self.public_message
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = ErrorBody::new(self.public_message);
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<ConversionError> for HttpError {
    fn from(error: ConversionError) -> Self {
        // Renderer and storage diagnostics are returned verbatim.
        match &error {
            ConversionError::BadRequest(DomainError::Validation { message }) => HttpError::new(
                "application::conversion::bad_request",
                StatusCode::BAD_REQUEST,
                message.clone(),
                message.clone(),
            ),
            ConversionError::Render(_) => HttpError::from_error(
                "application::conversion::render_failure",
                StatusCode::INTERNAL_SERVER_ERROR,
                error.to_string(),
                &error,
            ),
            ConversionError::Storage(_) => HttpError::from_error(
                "application::conversion::storage_failure",
                StatusCode::INTERNAL_SERVER_ERROR,
                error.to_string(),
                &error,
            ),
        }
    }
}

impl From<RetrievalError> for HttpError {
    fn from(error: RetrievalError) -> Self {
        match error {
            RetrievalError::NotFound => HttpError::new(
                "application::conversion::retrieve",
                StatusCode::NOT_FOUND,
                "file not found",
                "requested artifact is not stored",
            ),
            RetrievalError::Storage(err) => HttpError::from_error(
                "application::conversion::retrieve",
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to read stored file",
                &err,
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{render::RenderError, storage::StorageError};

    #[test]
    fn bad_request_maps_to_400_with_message() {
        let err = HttpError::from(ConversionError::BadRequest(DomainError::validation(
            "Missing 'markdown' or 'file_name' in request body",
        )));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.public_message(),
            "Missing 'markdown' or 'file_name' in request body"
        );
    }

    #[test]
    fn render_failure_surfaces_diagnostic() {
        let err = HttpError::from(ConversionError::Render(RenderError::Failed {
            program: "weasyprint".into(),
            status: "exit status: 1".into(),
            stderr: "CSS parse error".into(),
        }));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.public_message(),
            "Conversion failed: weasyprint exited with exit status: 1: CSS parse error"
        );
    }

    #[test]
    fn storage_failure_is_distinct_from_render_failure() {
        let err = HttpError::from(ConversionError::Storage(StorageError::Io(
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.public_message().starts_with("Storage failed:"));
        assert!(err.public_message().contains("read-only"));
    }

    #[test]
    fn missing_artifact_is_404_without_paths() {
        let err = HttpError::from(RetrievalError::NotFound);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.public_message(), "file not found");
    }

    #[test]
    fn report_collects_error_chain() {
        let err = RenderError::Unavailable {
            program: "pandoc".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file"),
        };
        let report = ErrorReport::from_error("test", StatusCode::INTERNAL_SERVER_ERROR, &err);
        assert_eq!(report.messages.len(), 2);
        assert_eq!(report.messages[1], "No such file");
    }
}
