//! Kiosk dashboard server
//!
//! Serves weather, news headlines and market quotes to a wall display. Every
//! upstream call goes through one disk-persisted cache, and a background
//! sweeper drops entries once they outlive the TTL.

use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kioskdash::cache::{FetchCache, FileStore};
use kioskdash::cli::{Cli, LogFormat, ServerConfig};
use kioskdash::dashboard::Dashboard;
use kioskdash::data::{FeedClient, MarketClient, WeatherClient};
use kioskdash::server::{start_server, AppState, SharedState};
use kioskdash::sweeper::{SweeperConfig, SweeperHandle};

fn init_tracing(format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::from_default_env().add_directive("kioskdash=info".parse()?);

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(env_filter).init(),
    }
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match ServerConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    init_tracing(config.log_format)?;

    info!(
        addr = %config.addr,
        cache_file = %config.cache_file.display(),
        ttl_secs = config.ttl.as_secs(),
        sweep_interval_secs = config.sweep_interval.as_secs(),
        stale_policy = ?config.stale_policy,
        "Starting kiosk dashboard"
    );
    if config.openweather_key.is_none() {
        warn!("OPENWEATHER_API_KEY is not set, the weather page will be unavailable");
    }

    let cache = Arc::new(
        FetchCache::new(FileStore::new(&config.cache_file), config.ttl)
            .with_stale_policy(config.stale_policy),
    );
    let sweeper = SweeperHandle::spawn(cache.clone(), SweeperConfig::every(config.sweep_interval));

    let dashboard = Dashboard::new(
        cache,
        WeatherClient::new(config.city.clone(), config.openweather_key.clone()).with_lang(config.lang.clone()),
        FeedClient::news(),
        FeedClient::finance(),
        MarketClient::new(),
    );
    let state: SharedState = Arc::new(AppState::new(dashboard));

    let served = start_server(state, config.addr, shutdown_signal()).await;
    sweeper.shutdown().await;
    served?;

    info!("Stopped");
    Ok(())
}
