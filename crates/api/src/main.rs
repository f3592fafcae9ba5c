use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use synchub_core::backoff::BackoffConfig;
use synchub_db::{PgStore, Store};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use synchub_api::auth::{Cache, NoopCache, RedisCache};
use synchub_api::background::janitor::Janitor;
use synchub_api::config::{LogFormat, ServerConfig};
use synchub_api::router::build_app_router;
use synchub_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env().context("Invalid configuration")?;

    // --- Tracing ---
    init_tracing(config.log_format);
    tracing::info!(
        host = %config.host,
        port = config.api_port,
        storage_path = %config.storage_path.display(),
        "Loaded server configuration"
    );

    // --- Database ---
    let connect_options = config.database.connect_options()?;
    let pool = synchub_db::connect_with_retry(connect_options, &BackoffConfig::default())
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    synchub_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool, config.default_expiry_hours));

    // --- Token cache ---
    let cache: Arc<dyn Cache> = match &config.redis_url {
        Some(url) => {
            let cache = RedisCache::connect(url)
                .await
                .context("Failed to connect to Redis")?;
            tracing::info!("Token cache backed by Redis");
            Arc::new(cache)
        }
        None => {
            tracing::info!("REDIS_URL not set, token cache disabled");
            Arc::new(NoopCache)
        }
    };

    // --- Shared state ---
    let (state, fanout_worker) = AppState::build(config.clone(), Arc::clone(&store), cache)
        .context("Failed to build HTTP client")?;

    state
        .storage
        .ensure_layout()
        .await
        .context("Failed to create storage directories")?;

    // --- Background tasks ---
    let fanout_handle = tokio::spawn(fanout_worker.run());

    let janitor_cancel = CancellationToken::new();
    let janitor = Janitor {
        store: Arc::clone(&store),
        storage: state.storage.clone(),
        metrics: Arc::clone(&state.metrics),
        retention_grace: config.item_retention_grace(),
        interval: config.janitor_interval(),
    };
    let janitor_handle = tokio::spawn(janitor.run(janitor_cancel.clone()));

    let registry = Arc::clone(&state.registry);
    let app = build_app_router(state, &config);

    // --- Start server ---
    let host = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.api_port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    janitor_cancel.cancel();
    let _ = tokio::time::timeout(grace, janitor_handle).await;
    tracing::info!("Janitor stopped");

    // The router (and with it the last publisher) is gone, so the worker
    // drains what is queued and exits.
    let _ = tokio::time::timeout(grace, fanout_handle).await;
    tracing::info!("Fan-out worker stopped");

    let session_count = registry.shutdown_all().await;
    tracing::info!(session_count, "Closed remaining sessions");

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "synchub_api=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
