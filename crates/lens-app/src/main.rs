//! Context Lens capture proxy.
//!
//! Runs a local MITM proxy that forwards every recognized LLM API call to the
//! Context Lens ingest endpoint.
//!
//! ```text
//! context-lens-proxy --port 8888
//! https_proxy=http://localhost:8888 SSL_CERT_FILE=$(context-lens-proxy --print-ca-path) codex "prompt"
//! ```
//!
//! Capture settings come from the environment and are read once at startup:
//! `CONTEXT_LENS_INGEST_URL` and `CONTEXT_LENS_SESSION_ID`.

use std::path::PathBuf;

use clap::Parser;
use lens_core::CaptureConfig;
use lens_proxy::{CaManager, ProxyConfig, ProxyServer, DEFAULT_PROXY_PORT};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Context Lens capture proxy
#[derive(Parser, Debug)]
#[command(name = "context-lens-proxy", version, about)]
struct Args {
    /// Port to listen on (127.0.0.1 only)
    #[arg(long, default_value_t = DEFAULT_PROXY_PORT)]
    port: u16,

    /// Directory holding the interception CA (default: platform data dir)
    #[arg(long)]
    ca_dir: Option<PathBuf>,

    /// Print the CA certificate path (generating the CA if needed) and exit
    #[arg(long)]
    print_ca_path: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also write logs to daily-rotated files in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

/// Builds the default filter directive for the given level.
fn default_filter(level: &str) -> String {
    format!(
        "{target}={level},lens_proxy={level},lens_core={level},warn",
        target = lens_core::LOG_TARGET
    )
}

/// Initialize logging, optionally with file rotation.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_level = if args.debug { "debug" } else { &args.log_level };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));

    if let Some(log_dir) = &args.log_dir {
        if std::fs::create_dir_all(log_dir).is_ok() {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(5)
                .filename_prefix("context-lens-proxy")
                .filename_suffix("log")
                .build(log_dir)
                .ok();

            if let Some(appender) = file_appender {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_writer(std::io::stderr))
                    .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                    .init();

                tracing::info!("Logging to {:?}", log_dir);
                return Some(guard);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    if args.log_dir.is_some() {
        tracing::warn!("File logging unavailable, using console only");
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let ca_manager = match &args.ca_dir {
        Some(dir) => CaManager::new(dir),
        None => CaManager::with_default_dir()?,
    };

    if args.print_ca_path {
        ca_manager.ensure_ca()?;
        println!("{}", ca_manager.cert_path().display());
        return Ok(());
    }

    let _guard = init_logging(&args);

    let capture = CaptureConfig::from_env();
    tracing::info!(
        "Session: {}",
        capture.session_id.as_deref().unwrap_or("(none)")
    );

    let config = ProxyConfig::with_ca_manager(ca_manager)
        .with_port(args.port)
        .with_capture(capture);
    let mut handle = ProxyServer::new(config)?.start()?;

    let interrupted = tokio::select! {
        result = handle.finished() => {
            result?;
            false
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            true
        }
    };

    if interrupted {
        tracing::info!("Shutting down");
        handle.stop().await?;
    }
    Ok(())
}
