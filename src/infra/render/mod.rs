//! Concrete PDF renderers backed by external typesetting toolchains.

mod command;
mod document;
mod html;
mod pandoc;
mod process;

use std::{fs, sync::Arc};

use tracing::info;

pub use command::CommandPdfRenderer;
pub use document::DocumentBuilder;
pub use html::HtmlPdfRenderer;
pub use pandoc::PandocPdfRenderer;

use crate::{
    application::render::PdfRenderer,
    config::{RenderBackend, RenderSettings},
};

use super::error::InfraError;

/// Construct the renderer selected by `settings.backend`.
pub fn build_renderer(settings: &RenderSettings) -> Result<Arc<dyn PdfRenderer>, InfraError> {
    let renderer: Arc<dyn PdfRenderer> = match settings.backend {
        RenderBackend::Html => {
            let extra = match settings.html.stylesheet.as_ref() {
                Some(path) => Some(fs::read_to_string(path).map_err(|err| {
                    InfraError::renderer(format!(
                        "failed to read stylesheet {}: {err}",
                        path.display()
                    ))
                })?),
                None => None,
            };
            let document = DocumentBuilder::new(settings.font_family.clone(), extra.as_deref())
                .map_err(|err| InfraError::renderer(err.to_string()))?;
            Arc::new(HtmlPdfRenderer::new(
                settings.html.converter.clone(),
                document,
            ))
        }
        RenderBackend::Latex => Arc::new(PandocPdfRenderer::new(
            settings.latex.pandoc.clone(),
            settings.latex.pdf_engine.clone(),
            settings.font_family.clone(),
        )),
        RenderBackend::Command => {
            let command = settings.command.as_ref().ok_or_else(|| {
                InfraError::configuration("render.command.program is required for the command backend")
            })?;
            Arc::new(CommandPdfRenderer::new(
                command.program.clone(),
                command.args.clone(),
            ))
        }
    };

    info!(
        target = "infra::render",
        backend = renderer.backend(),
        timeout_secs = settings.timeout.as_secs(),
        font_family = %settings.font_family,
        "PDF renderer configured"
    );

    Ok(renderer)
}
