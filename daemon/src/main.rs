use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;
use voxmaild::config::load_config;
use voxmaild::server::{default_socket_path, DaemonServer};
use voxmaild::{CommandRateLimiter, DaemonState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .with_target(false)
        .with_env_filter(EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()))
        .init();

    info!("voxmail daemon (voxmaild) starting...");

    let config = load_config()?;
    let rate_limiter = CommandRateLimiter::from_config(&config.rate_limit)?;
    let io_timeout = Duration::from_secs(config.timeouts.socket_operation_timeout_seconds);

    let daemon_state = DaemonState::new(config)?;
    let state = Arc::new(Mutex::new(daemon_state));

    let server = DaemonServer::new(default_socket_path(), state, rate_limiter, io_timeout);

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
