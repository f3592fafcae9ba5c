use std::sync::Arc;

use synchub_db::Store;

use crate::auth::{Cache, TokenValidator};
use crate::config::ServerConfig;
use crate::fanout::{Fanout, FanoutWorker};
use crate::metrics::HubMetrics;
use crate::storage::FileStorage;
use crate::ws::registry::SessionRegistry;
use crate::ws::session::SessionTiming;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Persistence backend.
    pub store: Arc<dyn Store>,
    pub config: Arc<ServerConfig>,
    /// Live duplex sessions, keyed by device.
    pub registry: Arc<SessionRegistry>,
    /// Publishing end of the fan-out queue.
    pub fanout: Fanout,
    pub validator: Arc<TokenValidator>,
    /// Uploaded file layout under `STORAGE_PATH`.
    pub storage: FileStorage,
    pub metrics: Arc<HubMetrics>,
    /// Deadlines applied to new sessions.
    pub session_timing: SessionTiming,
}

impl AppState {
    /// Wire the shared components around a store and a token cache.
    ///
    /// Returns the fan-out worker, which the caller must spawn.
    pub fn build(
        config: ServerConfig,
        store: Arc<dyn Store>,
        cache: Arc<dyn Cache>,
    ) -> Result<(Self, FanoutWorker), reqwest::Error> {
        let metrics = Arc::new(HubMetrics::default());
        let registry = Arc::new(SessionRegistry::new());
        let validator = TokenValidator::new(
            &config.auth_service_url,
            config.identity_timeout(),
            cache,
            config.token_cache_ttl(),
            Arc::clone(&metrics),
        )?;
        let (fanout, worker) = Fanout::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            Arc::clone(&metrics),
        );

        let state = Self {
            store,
            storage: FileStorage::new(config.storage_path.clone()),
            config: Arc::new(config),
            registry,
            fanout,
            validator: Arc::new(validator),
            metrics,
            session_timing: SessionTiming::default(),
        };
        Ok((state, worker))
    }
}
