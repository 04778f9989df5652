use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

mod config;
mod dashboard;
mod db;
mod live_scores;
mod sync;

use config::Config;
use dashboard::AppState;
use db::models::LiveGame;
use db::Database;
use live_scores::EspnScoreboard;
use sync::{RateLimitedFetcher, RateLimiter, StatusBoard, SyncEngine, SyncService};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    // Open database
    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    // One limiter for the whole process: the quota belongs to our IP, not to
    // any one league.
    let limiter = Arc::new(RateLimiter::new(config.max_calls(), config.window())?);
    info!(
        "Rate limit: {} calls per {:?} shared by {} source(s)",
        config.max_calls(),
        config.window(),
        config.sources.len()
    );

    let status = StatusBoard::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut services = Vec::new();
    for source in &config.sources {
        let provider = Arc::new(EspnScoreboard::new(
            source,
            Some(config.espn_api_url.as_str()),
            config.fetch_timeout(),
        )?);
        let fetcher = RateLimitedFetcher::<LiveGame>::new(
            provider,
            Arc::clone(&limiter),
            config.fetch_timeout(),
        );
        let engine = SyncEngine::new(
            source.to_lowercase(),
            fetcher,
            Arc::new(db.clone()),
            config.cadence_policy(),
        );
        let service = SyncService::new(
            engine,
            config.outer_tick(),
            config.max_backoff(),
            status.clone(),
        )
        .with_startup_jitter(config.startup_jitter());

        services.push(tokio::spawn(service.run_forever(shutdown_rx.clone())));
    }
    info!("Started {} sync service(s)", services.len());

    // Start the status HTTP server
    let app = dashboard::router(AppState {
        db: db.clone(),
        status: status.clone(),
        limiter: Arc::clone(&limiter),
    });
    let addr: SocketAddr = config.status_addr.parse()?;
    info!("Status endpoint listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let mut server_shutdown = shutdown_rx.clone();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.changed().await;
            })
            .await;
        if let Err(e) = result {
            error!("Status server failed: {}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested; letting in-flight cycles finish");
    let _ = shutdown_tx.send(true);
    limiter.close();

    let joined = tokio::time::timeout(
        config.fetch_timeout() + Duration::from_secs(5),
        futures_util::future::join_all(services),
    )
    .await;
    match joined {
        Ok(results) => {
            for r in results {
                if let Err(e) = r {
                    error!("Sync service task failed: {}", e);
                }
            }
        }
        Err(_) => warn!("Sync services did not stop in time"),
    }
    let _ = server.await;

    info!("Stopped");
    Ok(())
}
