use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use windowgate::config::GateConfig;
use windowgate::http::{self, HttpServer};
use windowgate::ratelimit::{RateLimiter, Sweeper};

/// Sliding-window admission control service.
#[derive(Debug, Parser)]
#[command(name = "windowgate", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the HTTP listen address
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    info!("Starting Windowgate admission control service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = GateConfig::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.server.listen_addr = listen;
    }

    let policy = config.rate_limiting.policy()?;
    let sweep_interval = config.rate_limiting.sweep_interval()?;
    let extractor = config.rate_limiting.key_extractor()?;
    info!(
        listen_addr = %config.server.listen_addr,
        max_requests = policy.max_requests(),
        window_ms = policy.window().as_millis() as u64,
        idle_retention_ms = policy.idle_retention().as_millis() as u64,
        key_header = ?config.rate_limiting.key_header,
        "Configuration loaded"
    );

    // Initialize the rate limiter and its eviction sweep
    let rate_limiter = Arc::new(RateLimiter::new(policy));
    let sweeper = Sweeper::spawn(Arc::clone(&rate_limiter), sweep_interval);

    let server = HttpServer::new(
        config.server.listen_addr,
        http::router(rate_limiter, extractor),
    );

    // Run the server with graceful shutdown on Ctrl+C
    server.serve_with_shutdown(shutdown_signal()).await?;

    sweeper.shutdown().await;
    info!("Windowgate admission control service stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
