use std::{path::Path, process, sync::Arc, time::Duration};

use md2pdf::{
    application::{conversion::ConversionService, error::AppError, render::PdfRenderer},
    config,
    infra::{
        error::InfraError,
        http::{self, AppState},
        render::build_renderer,
        storage::{FsArtifactStore, write_atomic},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let store = FsArtifactStore::new(settings.storage.directory.clone())
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    match store.sweep_partials() {
        Ok(0) => {}
        Ok(removed) => info!(
            target = "md2pdf::storage",
            removed,
            "removed unfinished writes from storage"
        ),
        Err(err) => warn!(
            target = "md2pdf::storage",
            error = %err,
            "failed to sweep unfinished writes"
        ),
    }

    let renderer = build_renderer(&settings.render)?;
    let conversions = Arc::new(ConversionService::new(
        renderer,
        Arc::new(store),
        settings.render.timeout,
    ));

    let state = AppState {
        conversions,
        public_base_url: settings.public.base_url.clone(),
    };
    let router = http::build_router(state, settings.limits.max_request_bytes_usize());

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "md2pdf::serve",
        addr = %settings.server.addr,
        backend = settings.render.backend.as_str(),
        storage = %settings.storage.directory.display(),
        max_request_bytes = settings.limits.max_request_bytes.get(),
        "listening"
    );

    let grace = settings.server.graceful_shutdown;
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = drain_deadline(grace) => {
            warn!(
                target = "md2pdf::serve",
                grace_secs = grace.as_secs(),
                "in-flight requests did not finish in time; exiting"
            );
        }
    }

    info!(target = "md2pdf::serve", "server stopped");
    Ok(())
}

/// Completes `grace` after the first shutdown signal; never otherwise.
async fn drain_deadline(grace: Duration) {
    shutdown_signal().await;
    tokio::time::sleep(grace).await;
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

async fn run_render(settings: config::Settings, args: config::RenderArgs) -> Result<(), AppError> {
    let markdown = tokio::fs::read_to_string(&args.input)
        .await
        .map_err(|err| {
            AppError::validation(format!("failed to read {}: {err}", args.input.display()))
        })?;

    let renderer: Arc<dyn PdfRenderer> = build_renderer(&settings.render)?;
    let timeout = settings.render.timeout;
    let pdf = tokio::time::timeout(timeout, renderer.render(&markdown))
        .await
        .map_err(|_| AppError::unexpected(format!("render timed out after {timeout:?}")))?
        .map_err(|err| AppError::unexpected(format!("render failed: {err}")))?;

    let output = args.output_path();
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    let target = output.clone();
    let bytes = pdf.clone();
    tokio::task::spawn_blocking(move || write_atomic(&dir, &target, &bytes))
        .await
        .map_err(|err| AppError::unexpected(format!("write task failed: {err}")))?
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "md2pdf::render",
        backend = renderer.backend(),
        input = %args.input.display(),
        output = %output.display(),
        pdf_bytes = pdf.len(),
        "rendered"
    );
    Ok(())
}
