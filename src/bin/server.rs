//! `ScriptEval` Server Binary
//!
//! Starts the script evaluation HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! # Start server with default settings
//! cargo run --bin scripteval-server
//!
//! # Start with a config file and custom address
//! cargo run --bin scripteval-server -- --config prod.toml --host 0.0.0.0 --port 9000
//! ```
//!
//! Logs go to stderr unless `SCRIPTEVAL_LOG_FILE` names a file. `RUST_LOG`
//! overrides `logging.level`, `SCRIPTEVAL_LOG_JSON` overrides `logging.format`.

use std::env;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};

use scripteval::config::LoggingConfig;
use scripteval::protocol::rest;
use scripteval::protocol::Handler;
use scripteval::Config;

static TRACE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, Parser)]
#[command(name = "scripteval-server", version, about = "Script evaluation server")]
struct Args {
    /// Configuration file (default: config.toml + config.local.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address, overrides `http.host`
    #[arg(long)]
    host: Option<String>,

    /// Port, overrides `http.port`
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(&path.to_string_lossy())
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load().context("loading config")?,
    };

    init_tracing(&config.logging);

    if let Some(host) = args.host {
        config.http.host = host;
    }
    if let Some(port) = args.port {
        config.http.port = port;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        max_script_bytes = config.script.max_script_bytes,
        max_rows = config.script.max_rows,
        auth = config.http.auth.enabled,
        "server_starting"
    );

    let handler = Arc::new(Handler::from_config(&config));
    rest::start_http_server(handler, &config.http)
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("http server failed")?;

    Ok(())
}

fn init_tracing(logging_config: &LoggingConfig) {
    // Environment variables take precedence over config file values
    let json = env::var("SCRIPTEVAL_LOG_JSON")
        .ok()
        .map_or_else(|| logging_config.format == "json", |v| v != "0");

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging_config.level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let (writer, guard) = match env::var("SCRIPTEVAL_LOG_FILE") {
        Ok(path) => match open_log_file(&path) {
            Some(writer) => writer,
            None => tracing_appender::non_blocking(std::io::stderr()),
        },
        Err(_) => tracing_appender::non_blocking(std::io::stderr()),
    };
    let _ = TRACE_GUARD.set(guard);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_thread_names(true)
        .with_writer(writer)
        .with_timer(tracing_subscriber::fmt::time::SystemTime);

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = if json {
        Box::new(builder.json().finish())
    } else {
        Box::new(builder.compact().finish())
    };

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn open_log_file(path: &str) -> Option<(NonBlocking, WorkerGuard)> {
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        Ok(file) => Some(tracing_appender::non_blocking(file)),
        Err(e) => {
            eprintln!("ERROR: Unable to open SCRIPTEVAL_LOG_FILE '{path}': {e}");
            None
        }
    }
}
