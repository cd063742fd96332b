//! Markdown to PDF conversion service.
//!
//! `POST /convert` renders a Markdown document through an external
//! typesetting toolchain, stores the PDF under a sanitized name and answers
//! with a download link served by `GET /pdfs/{filename}`.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
