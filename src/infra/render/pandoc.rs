use std::{ffi::OsString, path::PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::application::render::{PdfRenderer, RenderError};

use super::process::{Workspace, run_to_pdf};

/// Converts Markdown with pandoc and a LaTeX engine.
pub struct PandocPdfRenderer {
    pandoc: PathBuf,
    pdf_engine: String,
    font_family: String,
}

impl PandocPdfRenderer {
    pub fn new(pandoc: PathBuf, pdf_engine: impl Into<String>, font_family: impl Into<String>) -> Self {
        Self {
            pandoc,
            pdf_engine: pdf_engine.into(),
            font_family: font_family.into(),
        }
    }

    fn arguments(&self, input: PathBuf, output: PathBuf) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(11);
        args.push(input.into_os_string());
        args.push("--from".into());
        args.push("markdown".into());
        args.push("--pdf-engine".into());
        args.push(self.pdf_engine.as_str().into());
        args.push("-V".into());
        args.push(format!("CJKmainfont={}", self.font_family).into());
        args.push("-V".into());
        args.push("geometry:margin=2cm".into());
        args.push("--output".into());
        args.push(output.into_os_string());
        args
    }
}

#[async_trait]
impl PdfRenderer for PandocPdfRenderer {
    fn backend(&self) -> &'static str {
        "latex"
    }

    async fn render(&self, markdown: &str) -> Result<Bytes, RenderError> {
        let workspace = Workspace::new()?;
        let input = workspace.write_input("input.md", markdown.as_bytes()).await?;
        let output = workspace.output_path();
        let args = self.arguments(input, output.clone());

        run_to_pdf(&self.pandoc, &args, &output).await
    }
}
