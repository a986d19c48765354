//! Design Fill Server
//!
//! Local image upload service with resized previews and timed retention of
//! everything it stores.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use design_fill_server::build_router;
use design_fill_server::clock::{SystemClock, TokioSleeper};
use design_fill_server::config::Config;
use design_fill_server::retention::RetentionSweeper;
use design_fill_server::state::AppState;
use design_fill_server::storage::LocalStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "design_fill_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting Design Fill Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Upload directory: {}", config.uploads.dir.display());
    tracing::info!("Allowed origins: {:?}", config.cors.allowed_origins);

    let storage = Arc::new(
        LocalStorage::open(&config.uploads.dir).context("Failed to open upload directory")?,
    );
    let clock = Arc::new(SystemClock);
    let retention = config
        .uploads
        .retention()
        .context("RETENTION_HOURS is not a usable number of hours")?;

    // Retention sweeper runs for the lifetime of the process
    RetentionSweeper::new(
        storage.clone(),
        clock.clone(),
        Arc::new(TokioSleeper),
        retention,
        config.uploads.sweep_interval(),
    )
    .spawn();

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid SERVER_HOST/SERVER_PORT")?;

    let app = build_router(AppState::new(config, storage, clock));

    tracing::info!("Design Fill Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
