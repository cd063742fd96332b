//! Storage-safe file names derived from client input.
//!
//! A [`SanitizedFilename`] is always a single path segment: it never contains
//! `/`, `\` or NUL, never starts with `.`, and therefore can never be `.` or
//! `..`. Joining it onto the storage root always lands directly inside it.

use std::fmt;

use super::error::DomainError;

const PDF_SUFFIX: &str = ".pdf";
const MAX_FILENAME_BYTES: usize = 255;

/// File name under which a rendered artifact is stored and served.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SanitizedFilename(String);

impl SanitizedFilename {
    /// Derive a storage name from the name the client asked for.
    ///
    /// Directory components are discarded, control characters dropped, and a
    /// `.pdf` suffix appended unless one is already present (any case).
    pub fn from_requested(requested: &str) -> Result<Self, DomainError> {
        let segment = requested
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default();

        let cleaned: String = segment.chars().filter(|ch| !ch.is_control()).collect();
        let base = cleaned
            .trim()
            .trim_start_matches('.')
            .trim_end_matches(|ch: char| ch == '.' || ch.is_whitespace());

        if base.is_empty() {
            return Err(DomainError::validation(
                "file_name must contain a file name",
            ));
        }

        let mut name = base.to_string();
        if !has_pdf_suffix(&name) {
            name.push_str(PDF_SUFFIX);
        }

        if name.len() > MAX_FILENAME_BYTES {
            return Err(DomainError::validation(format!(
                "file_name must be at most {MAX_FILENAME_BYTES} bytes"
            )));
        }

        Ok(Self(name))
    }

    /// Accept a name taken verbatim from a download URL.
    ///
    /// Nothing is rewritten here: the name either already is a valid single
    /// segment or it is rejected.
    pub fn from_stored(name: &str) -> Option<Self> {
        let valid = !name.is_empty()
            && name.len() <= MAX_FILENAME_BYTES
            && !name.starts_with('.')
            && !name.chars().any(|ch| ch == '/' || ch == '\\' || ch.is_control());

        valid.then(|| Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SanitizedFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn has_pdf_suffix(name: &str) -> bool {
    name.len() >= PDF_SUFFIX.len()
        && name
            .get(name.len() - PDF_SUFFIX.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(PDF_SUFFIX))
}
