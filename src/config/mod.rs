//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::NonZeroU64,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::{CliArgs, Command, RenderArgs, RenderOverrides, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "md2pdf";
const ENV_PREFIX: &str = "MD2PDF";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8003;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_STORAGE_DIR: &str = "pdfs";
const DEFAULT_MAX_REQUEST_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_FONT_FAMILY: &str = "Noto Sans CJK SC";
const DEFAULT_HTML_CONVERTER: &str = "weasyprint";
const DEFAULT_PANDOC: &str = "pandoc";
const DEFAULT_PDF_ENGINE: &str = "xelatex";
pub const INPUT_PLACEHOLDER: &str = "{input}";
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub storage: StorageSettings,
    pub public: PublicSettings,
    pub limits: LimitSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub directory: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PublicSettings {
    /// Base for download links. When unset the base is derived from each request.
    pub base_url: Option<Url>,
}

#[derive(Debug, Clone)]
pub struct LimitSettings {
    pub max_request_bytes: NonZeroU64,
}

impl LimitSettings {
    /// Body limit in the form the HTTP layer expects. Range-checked at load time.
    pub fn max_request_bytes_usize(&self) -> usize {
        usize::try_from(self.max_request_bytes.get()).unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderBackend {
    Html,
    Latex,
    Command,
}

impl RenderBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderBackend::Html => "html",
            RenderBackend::Latex => "latex",
            RenderBackend::Command => "command",
        }
    }
}

impl FromStr for RenderBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(RenderBackend::Html),
            "latex" => Ok(RenderBackend::Latex),
            "command" => Ok(RenderBackend::Command),
            other => Err(format!(
                "unknown backend `{other}` (expected html, latex or command)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub backend: RenderBackend,
    pub timeout: Duration,
    pub font_family: String,
    pub html: HtmlRenderSettings,
    pub latex: LatexRenderSettings,
    /// Present only when the `command` backend is configured.
    pub command: Option<CommandRenderSettings>,
}

#[derive(Debug, Clone)]
pub struct HtmlRenderSettings {
    pub converter: PathBuf,
    pub stylesheet: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct LatexRenderSettings {
    pub pandoc: PathBuf,
    pub pdf_engine: String,
}

#[derive(Debug, Clone)]
pub struct CommandRenderSettings {
    pub program: PathBuf,
    pub args: Vec<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    load_with_environment(cli, environment())
}

/// `MD2PDF__SECTION__KEY` variables from the process environment.
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX).separator("__")
}

/// As [`load`], with the environment layer supplied by the caller.
pub fn load_with_environment(cli: &CliArgs, env: Environment) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(env);

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Render(args)) => raw.apply_render_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    storage: RawStorageSettings,
    public: RawPublicSettings,
    limits: RawLimitSettings,
    render: RawRenderSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(directory) = overrides.storage_directory.as_ref() {
            self.storage.directory = Some(directory.clone());
        }
        if let Some(url) = overrides.public_base_url.as_ref() {
            self.public.base_url = Some(url.clone());
        }
        if let Some(limit) = overrides.max_request_bytes {
            self.limits.max_request_bytes = Some(limit);
        }

        self.apply_render_overrides(&overrides.render);
    }

    fn apply_render_overrides(&mut self, overrides: &RenderOverrides) {
        if let Some(backend) = overrides.backend.as_ref() {
            self.render.backend = Some(backend.clone());
        }
        if let Some(seconds) = overrides.timeout_seconds {
            self.render.timeout_seconds = Some(seconds);
        }
        if let Some(family) = overrides.font_family.as_ref() {
            self.render.font_family = Some(family.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            storage,
            public,
            limits,
            render,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            storage: build_storage_settings(storage)?,
            public: build_public_settings(public)?,
            limits: build_limit_settings(limits)?,
            render: build_render_settings(render)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr =
        parse_socket_addr(&host, port).map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    let graceful_shutdown = non_zero_seconds(graceful_secs, "server.graceful_shutdown_seconds")?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let directory = storage
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "storage.directory",
            "path must not be empty",
        ));
    }

    Ok(StorageSettings { directory })
}

fn build_public_settings(public: RawPublicSettings) -> Result<PublicSettings, LoadError> {
    let base_url = match non_blank(public.base_url) {
        Some(value) => {
            let url = Url::parse(&value)
                .map_err(|err| LoadError::invalid("public.base_url", format!("{err}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(LoadError::invalid(
                    "public.base_url",
                    "scheme must be http or https",
                ));
            }
            Some(url)
        }
        None => None,
    };

    Ok(PublicSettings { base_url })
}

fn build_limit_settings(limits: RawLimitSettings) -> Result<LimitSettings, LoadError> {
    let max_request_bytes_value = limits
        .max_request_bytes
        .unwrap_or(DEFAULT_MAX_REQUEST_BYTES);
    let max_request_bytes = NonZeroU64::new(max_request_bytes_value).ok_or_else(|| {
        LoadError::invalid("limits.max_request_bytes", "must be greater than zero")
    })?;
    usize::try_from(max_request_bytes_value).map_err(|_| {
        LoadError::invalid(
            "limits.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(LimitSettings { max_request_bytes })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let RawRenderSettings {
        backend,
        timeout_seconds,
        font_family,
        html,
        latex,
        command,
    } = render;

    let backend = match non_blank(backend) {
        Some(value) => RenderBackend::from_str(&value)
            .map_err(|reason| LoadError::invalid("render.backend", reason))?,
        None => RenderBackend::Html,
    };

    let timeout = non_zero_seconds(
        timeout_seconds.unwrap_or(DEFAULT_RENDER_TIMEOUT_SECS),
        "render.timeout_seconds",
    )?;

    let font_family = non_blank(font_family).unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string());
    if font_family.contains(['\'', '"', '\\', ';', '{', '}', '<', '>', '&']) {
        return Err(LoadError::invalid(
            "render.font_family",
            "must be a plain family name without quotes or markup",
        ));
    }

    let converter = html
        .converter
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HTML_CONVERTER));
    ensure_non_empty_path(&converter, "render.html.converter")?;
    let stylesheet = html.stylesheet.filter(|path| !path.as_os_str().is_empty());

    let pandoc = latex.pandoc.unwrap_or_else(|| PathBuf::from(DEFAULT_PANDOC));
    ensure_non_empty_path(&pandoc, "render.latex.pandoc")?;
    let pdf_engine = non_blank(latex.pdf_engine).unwrap_or_else(|| DEFAULT_PDF_ENGINE.to_string());

    let command = build_command_settings(command, backend)?;

    Ok(RenderSettings {
        backend,
        timeout,
        font_family,
        html: HtmlRenderSettings {
            converter,
            stylesheet,
        },
        latex: LatexRenderSettings { pandoc, pdf_engine },
        command,
    })
}

fn build_command_settings(
    command: RawCommandRenderSettings,
    backend: RenderBackend,
) -> Result<Option<CommandRenderSettings>, LoadError> {
    let program = command
        .program
        .filter(|path| !path.as_os_str().is_empty());

    let Some(program) = program else {
        if backend == RenderBackend::Command {
            return Err(LoadError::invalid(
                "render.command.program",
                "required when render.backend = command",
            ));
        }
        return Ok(None);
    };

    let args = command.args.unwrap_or_else(|| {
        vec![INPUT_PLACEHOLDER.to_string(), OUTPUT_PLACEHOLDER.to_string()]
    });
    if !args.iter().any(|arg| arg.contains(OUTPUT_PLACEHOLDER)) {
        return Err(LoadError::invalid(
            "render.command.args",
            format!("must reference the {OUTPUT_PLACEHOLDER} placeholder"),
        ));
    }

    Ok(Some(CommandRenderSettings { program, args }))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPublicSettings {
    base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLimitSettings {
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    backend: Option<String>,
    timeout_seconds: Option<u64>,
    font_family: Option<String>,
    html: RawHtmlRenderSettings,
    latex: RawLatexRenderSettings,
    command: RawCommandRenderSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawHtmlRenderSettings {
    converter: Option<PathBuf>,
    stylesheet: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLatexRenderSettings {
    pandoc: Option<PathBuf>,
    pdf_engine: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCommandRenderSettings {
    program: Option<PathBuf>,
    args: Option<Vec<String>>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn ensure_non_empty_path(path: &std::path::Path, key: &'static str) -> Result<(), LoadError> {
    if path.as_os_str().is_empty() {
        return Err(LoadError::invalid(key, "path must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
