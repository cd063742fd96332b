//! Conversion request and result values.

use url::Url;

use super::{error::DomainError, filename::SanitizedFilename};

pub const MISSING_FIELDS_MESSAGE: &str = "Missing 'markdown' or 'file_name' in request body";

/// A validated conversion request: both fields present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub markdown: String,
    pub requested_name: String,
}

impl ConversionRequest {
    /// Validate the raw, possibly-missing fields of an incoming request.
    pub fn parse(
        markdown: Option<String>,
        requested_name: Option<String>,
    ) -> Result<Self, DomainError> {
        let (Some(markdown), Some(requested_name)) = (markdown, requested_name) else {
            return Err(DomainError::validation(MISSING_FIELDS_MESSAGE));
        };

        if markdown.is_empty() {
            return Err(DomainError::validation("'markdown' must not be empty"));
        }
        if requested_name.trim().is_empty() {
            return Err(DomainError::validation("'file_name' must not be empty"));
        }

        Ok(Self {
            markdown,
            requested_name,
        })
    }

    pub fn sanitized_name(&self) -> Result<SanitizedFilename, DomainError> {
        SanitizedFilename::from_requested(&self.requested_name)
    }
}

/// Outcome of a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub url: Url,
    pub file_name: SanitizedFilename,
    pub size_bytes: usize,
}

/// Build the public download URL for a stored artifact.
///
/// The name is pushed as a single path segment, so characters such as `#`,
/// `?` or spaces are percent-encoded rather than reinterpreted.
pub fn download_url(base: &Url, file_name: &SanitizedFilename) -> Url {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push("pdfs").push(file_name.as_str());
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_are_rejected() {
        for (markdown, name) in [
            (None, None),
            (Some("# t".to_string()), None),
            (None, Some("t.pdf".to_string())),
        ] {
            let err = ConversionRequest::parse(markdown, name).expect_err("missing field");
            assert_eq!(err.to_string(), MISSING_FIELDS_MESSAGE);
        }
    }

    #[test]
    fn empty_fields_are_rejected() {
        assert!(ConversionRequest::parse(Some(String::new()), Some("t".into())).is_err());
        assert!(ConversionRequest::parse(Some("# t".into()), Some("  ".into())).is_err());
    }

    #[test]
    fn valid_request_round_trips_fields() {
        let request = ConversionRequest::parse(Some("# t".into()), Some("t".into()))
            .expect("valid request");
        assert_eq!(request.markdown, "# t");
        assert_eq!(request.requested_name, "t");
        assert_eq!(
            request.sanitized_name().expect("name").as_str(),
            "t.pdf"
        );
    }

    #[test]
    fn download_url_appends_encoded_segment() {
        let base = Url::parse("https://docs.example.com/").expect("url");
        let name = SanitizedFilename::from_requested("q #1?.pdf").expect("name");
        let url = download_url(&base, &name);
        assert_eq!(url.as_str(), "https://docs.example.com/pdfs/q%20%231%3F.pdf");
    }

    #[test]
    fn download_url_respects_base_path() {
        let base = Url::parse("http://localhost:8003/md2pdf/").expect("url");
        let name = SanitizedFilename::from_requested("t").expect("name");
        assert_eq!(
            download_url(&base, &name).as_str(),
            "http://localhost:8003/md2pdf/pdfs/t.pdf"
        );

        let base = Url::parse("http://localhost:8003/md2pdf").expect("url");
        assert_eq!(
            download_url(&base, &name).as_str(),
            "http://localhost:8003/md2pdf/pdfs/t.pdf"
        );
    }
}
