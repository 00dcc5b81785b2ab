//! Copyguard Server - copyright scan workers and admin API
//!
//! Starts the scan worker pool, the owner notification dispatcher and the
//! HTTP API on one runtime:
//! - POST /v1/scans - queue a copyright scan for a content
//! - /v1/references - register and administer protected works
//! - GET /v1/contents/{id}/matches - audit trail for disputes

use std::sync::Arc;

use anyhow::Context;
use copyguard_core::{HttpImageExtractor, SimHasher};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use copyguard_server::notify::{self, DispatchConfig};
use copyguard_server::{
    create_router_with_config, AppState, Backend, Config, LogAlertSink, LogNotificationSink,
    NotificationDispatcher, NotificationSink, Orchestrator, ScanLeases, ScanWorker,
    WebhookNotificationSink,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "copyguard_server=info,copyguard_core=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let backend = Backend::connect(&config)
        .await
        .context("Failed to connect storage backend")?;
    let stores = backend.stores();
    let queue = backend.queue(&config);

    let (publisher, notifications) = notify::channel();
    let sink: Arc<dyn NotificationSink> = match &config.notify_webhook_url {
        Some(url) => Arc::new(
            WebhookNotificationSink::new(url.clone(), config.fetch_config().timeout)
                .context("Failed to build notification webhook client")?,
        ),
        None => Arc::new(LogNotificationSink),
    };
    let dispatcher = NotificationDispatcher::new(notifications, sink, DispatchConfig::default());
    let dispatcher_handle = tokio::spawn(dispatcher.run());

    let images = HttpImageExtractor::new(config.fetch_config())
        .context("Failed to build media fetcher")?;
    let orchestrator = Arc::new(Orchestrator::new(
        stores,
        Arc::new(images),
        Arc::new(SimHasher),
        ScanLeases::new(config.lease_ttl()),
        publisher,
    ));

    let worker = ScanWorker::new(
        queue.clone(),
        orchestrator,
        Arc::new(LogAlertSink),
        config.retry_policy(),
    )
    .with_job_timeout(config.job_timeout())
    .with_poll_interval(config.poll_interval());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let workers = worker.spawn_pool(config.worker_concurrency, shutdown_rx);
    drop(worker);

    let app = create_router_with_config(AppState::new(backend, queue), &config);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(
        %addr,
        workers = config.worker_concurrency,
        max_attempts = config.scan_max_attempts,
        "Copyguard server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Shutting down scan workers");
    let _ = shutdown_tx.send(true);
    for handle in workers {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Scan worker panicked");
        }
    }

    // Workers held the last publishers; the dispatcher drains and exits.
    if let Err(e) = dispatcher_handle.await {
        tracing::error!(error = %e, "Notification dispatcher panicked");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
