use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, Uri, header},
};
use md2pdf_api_types::{ConvertRequest, ConvertResponse};
use url::Url;

use crate::application::error::HttpError;

use super::AppState;

const SOURCE: &str = "infra::http::convert";
const FORWARDED_PROTO: &str = "x-forwarded-proto";

pub(super) async fn convert(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Json<ConvertResponse>, HttpError> {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            state.conversions.record_rejection();
            return Err(rejection_to_http(rejection));
        }
    };

    let public_base = match state.public_base_url.as_ref() {
        Some(configured) => configured.clone(),
        None => request_base_url(&uri, &headers)?,
    };

    let converted = state
        .conversions
        .submit(body.markdown, body.file_name, &public_base)
        .await?;

    Ok(Json(ConvertResponse {
        url: converted.url.to_string(),
        file_name: converted.file_name.into_inner(),
    }))
}

fn rejection_to_http(rejection: JsonRejection) -> HttpError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return HttpError::new(
            SOURCE,
            StatusCode::PAYLOAD_TOO_LARGE,
            "Request body too large",
            rejection.body_text(),
        );
    }

    let public_message = match &rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "Expected request with `Content-Type: application/json`".to_string()
        }
        _ => format!("Invalid JSON body: {}", rejection.body_text()),
    };
    HttpError::new(
        SOURCE,
        StatusCode::BAD_REQUEST,
        public_message,
        rejection.body_text(),
    )
}

/// Base URL the client reached us on: `X-Forwarded-Proto` (or `http`) plus
/// the `Host` header.
fn request_base_url(uri: &Uri, headers: &HeaderMap) -> Result<Url, HttpError> {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|authority| authority.to_string()))
        .map(|host| host.trim().to_string())
        .filter(|host| !host.is_empty())
        .ok_or_else(|| {
            HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Missing Host header",
                "cannot derive a download URL without a Host header",
            )
        })?;

    if host.contains(['/', '\\', '?', '#', '@', ' ']) {
        return Err(HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Invalid Host header",
            format!("host `{host}` contains reserved characters"),
        ));
    }

    let scheme = headers
        .get(FORWARDED_PROTO)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| value == "http" || value == "https")
        .unwrap_or_else(|| "http".to_string());

    Url::parse(&format!("{scheme}://{host}/")).map_err(|err| {
        HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Invalid Host header",
            err.to_string(),
        )
    })
}
