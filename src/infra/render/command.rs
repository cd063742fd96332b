use std::{ffi::OsString, path::Path, path::PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    application::render::{PdfRenderer, RenderError},
    config::{INPUT_PLACEHOLDER, OUTPUT_PLACEHOLDER},
};

use super::process::{Workspace, run_to_pdf};

/// Runs a packaged Markdown-to-PDF tool. `{input}` and `{output}` in the
/// configured arguments are replaced with the scratch file paths.
pub struct CommandPdfRenderer {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandPdfRenderer {
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self { program, args }
    }

    fn arguments(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
                    .into()
            })
            .collect()
    }
}

#[async_trait]
impl PdfRenderer for CommandPdfRenderer {
    fn backend(&self) -> &'static str {
        "command"
    }

    async fn render(&self, markdown: &str) -> Result<Bytes, RenderError> {
        let workspace = Workspace::new()?;
        let input = workspace.write_input("input.md", markdown.as_bytes()).await?;
        let output = workspace.output_path();
        let args = self.arguments(&input, &output);

        run_to_pdf(&self.program, &args, &output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_substituted_inside_arguments() {
        let renderer = CommandPdfRenderer::new(
            "md-to-pdf".into(),
            vec![
                "--in={input}".to_string(),
                "-o".to_string(),
                "{output}".to_string(),
                "--quiet".to_string(),
            ],
        );
        let args = renderer.arguments(Path::new("/w/input.md"), Path::new("/w/output.pdf"));
        assert_eq!(
            args,
            vec![
                OsString::from("--in=/w/input.md"),
                OsString::from("-o"),
                OsString::from("/w/output.pdf"),
                OsString::from("--quiet"),
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_configured_program() {
        use crate::infra::render::process::test_support::write_script;
        use tempfile::TempDir;

        let dir = TempDir::new().expect("temp dir");
        let program = write_script(
            dir.path(),
            "md-to-pdf",
            "[ \"$1\" = \"-o\" ] || exit 3\n{ printf '%%PDF-1.4 '; cat \"$3\"; } > \"$2\"\n",
        );
        let renderer = CommandPdfRenderer::new(
            program,
            vec!["-o".to_string(), "{output}".to_string(), "{input}".to_string()],
        );

        let pdf = renderer.render("body").await.expect("pdf");
        assert_eq!(&pdf[..], b"%PDF-1.4 body");
    }
}
