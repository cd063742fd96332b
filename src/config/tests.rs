use super::*;

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr, "0.0.0.0:8003".parse().expect("addr"));
    assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(30));
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.storage.directory, PathBuf::from("pdfs"));
    assert!(settings.public.base_url.is_none());
    assert_eq!(
        settings.limits.max_request_bytes.get(),
        DEFAULT_MAX_REQUEST_BYTES
    );
    assert_eq!(settings.render.backend, RenderBackend::Html);
    assert_eq!(settings.render.timeout, Duration::from_secs(60));
    assert_eq!(settings.render.font_family, "Noto Sans CJK SC");
    assert_eq!(settings.render.html.converter, PathBuf::from("weasyprint"));
    assert_eq!(settings.render.latex.pandoc, PathBuf::from("pandoc"));
    assert_eq!(settings.render.latex.pdf_engine, "xelatex");
    assert!(settings.render.command.is_none());
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.render.backend = Some("html".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        render: RenderOverrides {
            backend: Some("latex".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.render.backend, RenderBackend::Latex);
}

#[test]
fn request_limit_can_be_overridden_via_cli() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        max_request_bytes: Some(1_572_864),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.limits.max_request_bytes.get(), 1_572_864);
    assert_eq!(settings.limits.max_request_bytes_usize(), 1_572_864);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_values_are_rejected() {
    let mut raw = RawSettings::default();
    raw.render.timeout_seconds = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero timeout");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "render.timeout_seconds",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.limits.max_request_bytes = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero limit");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "limits.max_request_bytes",
            ..
        }
    ));
}

#[test]
fn unknown_backend_is_rejected() {
    let mut raw = RawSettings::default();
    raw.render.backend = Some("typst".to_string());
    let err = Settings::from_raw(raw).expect_err("unknown backend");
    assert!(err.to_string().contains("typst"));
}

#[test]
fn command_backend_requires_program() {
    let mut raw = RawSettings::default();
    raw.render.backend = Some("command".to_string());
    let err = Settings::from_raw(raw).expect_err("program missing");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "render.command.program",
            ..
        }
    ));
}

#[test]
fn command_backend_defaults_args_to_placeholders() {
    let mut raw = RawSettings::default();
    raw.render.backend = Some("Command".to_string());
    raw.render.command.program = Some(PathBuf::from("md-to-pdf"));
    let settings = Settings::from_raw(raw).expect("valid settings");

    let command = settings.render.command.expect("command settings");
    assert_eq!(command.program, PathBuf::from("md-to-pdf"));
    assert_eq!(command.args, vec!["{input}", "{output}"]);
}

#[test]
fn command_args_must_name_output() {
    let mut raw = RawSettings::default();
    raw.render.backend = Some("command".to_string());
    raw.render.command.program = Some(PathBuf::from("md-to-pdf"));
    raw.render.command.args = Some(vec!["{input}".to_string()]);
    let err = Settings::from_raw(raw).expect_err("missing output placeholder");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "render.command.args",
            ..
        }
    ));
}

#[test]
fn public_base_url_must_be_http() {
    let mut raw = RawSettings::default();
    raw.public.base_url = Some("ftp://files.example.com/".to_string());
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.public.base_url = Some("https://docs.example.com/md2pdf/".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.public.base_url.expect("base url").as_str(),
        "https://docs.example.com/md2pdf/"
    );
}

#[test]
fn blank_public_base_url_means_derive_from_request() {
    let mut raw = RawSettings::default();
    raw.public.base_url = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.public.base_url.is_none());
}

#[test]
fn font_family_cannot_escape_stylesheet() {
    let mut raw = RawSettings::default();
    raw.render.font_family = Some("x'; } body { color: red".to_string());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["md2pdf"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "md2pdf",
        "serve",
        "--server-host",
        "127.0.0.1",
        "--server-port",
        "9000",
        "--storage-directory",
        "/var/lib/md2pdf",
        "--public-base-url",
        "https://pdf.example.com/",
        "--render-backend",
        "latex",
        "--render-timeout-seconds",
        "120",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("127.0.0.1"));
            assert_eq!(serve.overrides.server_port, Some(9000));
            assert_eq!(
                serve.overrides.storage_directory.as_deref(),
                Some(std::path::Path::new("/var/lib/md2pdf"))
            );
            assert_eq!(
                serve.overrides.public_base_url.as_deref(),
                Some("https://pdf.example.com/")
            );
            assert_eq!(serve.overrides.render.backend.as_deref(), Some("latex"));
            assert_eq!(serve.overrides.render.timeout_seconds, Some(120));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_render_arguments() {
    let args = CliArgs::parse_from([
        "md2pdf",
        "render",
        "--render-font-family",
        "Source Han Serif SC",
        "notes/report.md",
    ]);

    match args.command.expect("render command") {
        Command::Render(render) => {
            assert_eq!(render.input, std::path::Path::new("notes/report.md"));
            assert_eq!(
                render.output_path(),
                std::path::Path::new("notes/report.pdf")
            );
            assert_eq!(
                render.overrides.font_family.as_deref(),
                Some("Source Han Serif SC")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn render_output_can_be_set_explicitly() {
    let args = CliArgs::parse_from(["md2pdf", "render", "in.md", "--output", "/tmp/out.pdf"]);
    match args.command.expect("render command") {
        Command::Render(render) => {
            assert_eq!(render.output_path(), std::path::Path::new("/tmp/out.pdf"));
        }
        _ => panic!("wrong command parsed"),
    }
}
