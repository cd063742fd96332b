//! Shared runner for renderers that shell out to a typesetting CLI.
//!
//! Every invocation gets its own scratch directory. The directory and the
//! child process are both scoped to the returned future: dropping it (for
//! example when the render deadline expires) kills the child and removes the
//! scratch files.

use std::{
    ffi::OsString,
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Stdio,
    time::Instant,
};

use bytes::Bytes;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::application::render::{RenderError, ensure_pdf};

const SOURCE: &str = "infra::render::process";
const OUTPUT_FILE: &str = "output.pdf";

/// Scratch directory holding the input and output of one render.
#[derive(Debug)]
pub(crate) struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub(crate) fn new() -> Result<Self, RenderError> {
        let dir = tempfile::Builder::new().prefix("md2pdf-").tempdir()?;
        Ok(Self { dir })
    }

    pub(crate) async fn write_input(
        &self,
        file_name: &str,
        contents: &[u8],
    ) -> Result<PathBuf, RenderError> {
        let path = self.dir.path().join(file_name);
        tokio::fs::write(&path, contents).await?;
        Ok(path)
    }

    pub(crate) fn output_path(&self) -> PathBuf {
        self.dir.path().join(OUTPUT_FILE)
    }
}

/// Run `program` to completion and return the PDF it wrote to `output`.
pub(crate) async fn run_to_pdf(
    program: &Path,
    args: &[OsString],
    output: &Path,
) -> Result<Bytes, RenderError> {
    let started_at = Instant::now();
    let program_name = program.display().to_string();

    let result = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await;

    let finished = match result {
        Ok(finished) => finished,
        Err(err) => {
            let error_code = if err.kind() == ErrorKind::NotFound {
                "not_found"
            } else {
                "spawn"
            };
            warn!(
                target = SOURCE,
                program = %program_name,
                error_code,
                error = %err,
                "Failed to spawn renderer"
            );
            return Err(RenderError::Unavailable {
                program: program_name,
                source: err,
            });
        }
    };

    let elapsed_ms = started_at.elapsed().as_millis() as u64;

    if !finished.status.success() {
        let stderr = String::from_utf8_lossy(&finished.stderr).trim().to_string();
        warn!(
            target = SOURCE,
            program = %program_name,
            exit_code = finished.status.code().map(i64::from).unwrap_or(-1),
            elapsed_ms,
            stderr = %stderr,
            "Renderer exited unsuccessfully"
        );
        return Err(RenderError::Failed {
            program: program_name,
            status: finished.status.to_string(),
            stderr,
        });
    }

    let bytes = match tokio::fs::read(output).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(RenderError::EmptyOutput {
                program: program_name,
            });
        }
        Err(err) => return Err(RenderError::Io(err)),
    };

    if bytes.is_empty() {
        return Err(RenderError::EmptyOutput {
            program: program_name,
        });
    }
    ensure_pdf(&bytes)?;

    debug!(
        target = SOURCE,
        program = %program_name,
        elapsed_ms,
        pdf_bytes = bytes.len(),
        "Renderer produced PDF"
    );

    Ok(Bytes::from(bytes))
}
