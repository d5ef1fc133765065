//! socksd - SOCKS5 proxy server
//!
//! This is the main entry point for the socksd daemon.

use anyhow::Result;
use clap::Parser;
use socksd::config::ServerConfig;
use socksd::server::run_server;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// SOCKS5 proxy server (RFC 1928 / RFC 1929)
#[derive(Parser, Debug)]
#[command(name = "socksd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// `[port]`, `[username password]` or `[port username password]`;
    /// defaults to port 1080 with no authentication
    #[arg(value_name = "ARGS")]
    args: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match ServerConfig::from_args(&args.args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("socksd: {}", e);
            std::process::exit(1);
        }
    };

    setup_logging(&args.log_level)?;

    info!("socksd v{}", socksd::VERSION);
    info!("Listening port: {}", config.port);
    if config.has_credentials() {
        info!("Username/password authentication enabled");
    } else {
        info!("No authentication required");
    }

    let config = Arc::new(config);

    tokio::select! {
        _ = shutdown_signal() => {}
        result = run_server(config) => result?,
    }

    Ok(())
}

/// Wait for SIGINT or SIGTERM
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm =
        signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

/// Wait for Ctrl+C
#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received Ctrl+C, shutting down...");
}

/// Setup logging based on the requested level
fn setup_logging(level: &str) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}
