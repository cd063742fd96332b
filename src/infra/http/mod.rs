//! HTTP surface: `POST /convert`, `GET /pdfs/{filename}`, `GET /health`.

mod convert;
mod middleware;
mod pdfs;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
};
use md2pdf_api_types::HealthResponse;
use url::Url;

use crate::application::{conversion::ConversionService, error::HttpError};

pub use middleware::{REQUEST_ID_HEADER, RequestContext};

use middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct AppState {
    pub conversions: Arc<ConversionService>,
    /// Fixed base for download links; derived per request when `None`.
    pub public_base_url: Option<Url>,
}

/// Build the service router. `max_request_bytes` caps every request body.
pub fn build_router(state: AppState, max_request_bytes: usize) -> Router {
    Router::new()
        .route("/convert", post(convert::convert))
        .route("/pdfs/{filename}", get(pdfs::download))
        .route("/health", get(health))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

async fn not_found() -> HttpError {
    HttpError::new(
        "infra::http::fallback",
        StatusCode::NOT_FOUND,
        "not found",
        "no route matches the request",
    )
}

async fn method_not_allowed() -> HttpError {
    HttpError::new(
        "infra::http::fallback",
        StatusCode::METHOD_NOT_ALLOWED,
        "method not allowed",
        "route exists but does not accept this method",
    )
}
