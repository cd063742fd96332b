//! Wire types for the md2pdf HTTP API.
//!
//! Both fields of [`ConvertRequest`] are optional at the serde level so the
//! server can answer a missing field with its own `400` body instead of a
//! framework rejection.

use serde::{Deserialize, Serialize};

/// Body of `POST /convert`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl ConvertRequest {
    pub fn new(markdown: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            markdown: Some(markdown.into()),
            file_name: Some(file_name.into()),
        }
    }
}

/// Successful conversion: where to download the PDF and under which name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub url: String,
    pub file_name: String,
}

/// Every failure response carries exactly this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_deserialize_as_none() {
        let request: ConvertRequest = serde_json::from_str("{}").expect("empty object");
        assert_eq!(request, ConvertRequest::default());
    }

    #[test]
    fn error_body_uses_error_key() {
        let body = serde_json::to_value(ErrorBody::new("boom")).expect("serialize");
        assert_eq!(body, serde_json::json!({ "error": "boom" }));
    }

    #[test]
    fn health_reports_ok() {
        let body = serde_json::to_value(HealthResponse::ok()).expect("serialize");
        assert_eq!(body, serde_json::json!({ "status": "ok" }));
    }
}
