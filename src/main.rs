//! Lab Photo Server
//!
//! Accepts BMP uploads from lab cameras over raw TCP and serves a
//! per-homework gallery of everything received.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::sync::watch;

use lab_photo_server::config::Config;
use lab_photo_server::routes;
use lab_photo_server::state::AppState;
use lab_photo_server::storage::PhotoStore;
use lab_photo_server::telemetry;
use lab_photo_server::upload::ImageServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();

    let (config, config_error) = match Config::from_env() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    // Initialize tracing; the guard flushes file logs when main returns
    let _log_guard = telemetry::init(&config.logging);

    if let Some(e) = config_error {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
    }

    tracing::info!("Starting Lab Photo Server v{}", env!("CARGO_PKG_VERSION"));
    let photo_store = PhotoStore::new(config.storage.root.clone());
    tracing::info!("Photo root: {}", photo_store.root().display());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Upload protocol
    let image_addr = format!("{}:{}", config.server.host, config.server.image_port);
    let image_server = ImageServer::bind(image_addr.as_str(), config.session_policy(), photo_store.clone())
        .await
        .with_context(|| format!("failed to bind image server on {}", image_addr))?;
    let image_task = tokio::spawn(image_server.serve(wait_for(shutdown_rx.clone())));

    // Gallery
    let web_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.web_port)
        .parse()
        .context("invalid web server address")?;
    let listener = tokio::net::TcpListener::bind(web_addr)
        .await
        .with_context(|| format!("failed to bind web server on {}", web_addr))?;
    tracing::info!("Gallery listening on http://{}", web_addr);

    let app = routes::app(AppState::new(config.clone(), photo_store));
    let web_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for(shutdown_rx))
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    image_task.await.context("image server task panicked")?;
    web_task
        .await
        .context("web server task panicked")?
        .context("web server failed")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolve once the shutdown flag flips
async fn wait_for(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
