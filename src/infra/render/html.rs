use std::{ffi::OsString, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;

use crate::application::render::{PdfRenderer, RenderError};

use super::{
    document::DocumentBuilder,
    process::{Workspace, run_to_pdf},
};

/// Builds an HTML document in-process and hands it to an HTML+CSS-to-PDF
/// converter invoked as `<converter> <input.html> <output.pdf>`.
pub struct HtmlPdfRenderer {
    converter: PathBuf,
    document: Arc<DocumentBuilder>,
}

impl HtmlPdfRenderer {
    pub fn new(converter: PathBuf, document: DocumentBuilder) -> Self {
        Self {
            converter,
            document: Arc::new(document),
        }
    }
}

#[async_trait]
impl PdfRenderer for HtmlPdfRenderer {
    fn backend(&self) -> &'static str {
        "html"
    }

    async fn render(&self, markdown: &str) -> Result<Bytes, RenderError> {
        let document = Arc::clone(&self.document);
        let markdown = markdown.to_owned();
        let html = tokio::task::spawn_blocking(move || document.build(&markdown))
            .await
            .map_err(|err| RenderError::document(format!("document task failed: {err}")))??;

        let workspace = Workspace::new()?;
        let input = workspace.write_input("input.html", html.as_bytes()).await?;
        let output = workspace.output_path();
        let args: [OsString; 2] = [input.into_os_string(), output.clone().into_os_string()];

        run_to_pdf(&self.converter, &args, &output).await
    }
}
