//! Offline Sync agent binary
//!
//! Runs the offline manager next to an upstream API and exposes it over a
//! small control API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use offline_sync::api::{create_router, AppState};
use offline_sync::connectivity::HealthProbe;
use offline_sync::persistence::FileStore;
use offline_sync::queue::ExhaustedOperation;
use offline_sync::transport::HttpTransport;
use offline_sync::{Collaborators, Config, OfflineManager};

/// Main entry point for the offline sync agent.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the snapshot directory and the upstream transport
/// 4. Probe the upstream once to seed connectivity
/// 5. Open the manager and start its background tasks
/// 6. Prefetch configured keys
/// 7. Serve the control API until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "offline_sync=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting offline sync agent");

    let config = Config::from_env();
    info!(
        "Configuration loaded: capacity={}B, default_ttl={}s, drain_interval={}s, upstream={}, port={}",
        config.cache_capacity_bytes,
        config.default_ttl,
        config.drain_interval,
        config.upstream_url,
        config.server_port
    );

    let store = FileStore::open(&config.data_dir)
        .await
        .with_context(|| format!("opening data dir {}", config.data_dir.display()))?;
    let transport = HttpTransport::new(
        config.upstream_url.clone(),
        Duration::from_secs(config.execute_timeout),
    )
    .context("building upstream client")?;

    let probe = HealthProbe::new(
        config.health_url(),
        Duration::from_secs(config.probe_interval),
        Duration::from_millis(config.probe_timeout_ms),
    );
    let initial = probe.probe().await;
    info!("Upstream {} is {}", probe.url(), initial);

    let (exhausted_tx, exhausted_rx) = mpsc::unbounded_channel();
    let collaborators = Collaborators::new(Arc::new(store), Arc::new(transport))
        .with_exhausted_sender(exhausted_tx);

    let manager = Arc::new(OfflineManager::open(&config, collaborators, initial.is_online()).await);
    manager.start();
    manager.attach_signal(probe);
    let exhausted_handle = tokio::spawn(report_exhausted(exhausted_rx));
    info!("Background tasks started");

    if !config.prefetch_keys.is_empty() {
        manager.prefetch(&config.prefetch_keys).await;
    }

    let app = create_router(AppState::from_shared(manager.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Control API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving control API")?;

    manager.shutdown();
    exhausted_handle.abort();
    warn!("Background tasks aborted");

    info!("Agent shutdown complete");
    Ok(())
}

/// Logs operations the queue gave up on.
async fn report_exhausted(mut rx: mpsc::UnboundedReceiver<ExhaustedOperation>) {
    while let Some(exhausted) = rx.recv().await {
        let op = &exhausted.operation;
        warn!(
            "Dropped {} {} (id {}) after {} attempts: {}",
            op.target.method, op.target.resource, op.id, op.attempt_count, exhausted.error
        );
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
