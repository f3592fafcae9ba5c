//! Publish queue and the single worker that fans frames out to sessions.
//!
//! Handlers persist a sync item, then [`Fanout::publish`] a
//! [`BroadcastMessage`]. One [`FanoutWorker`] consumes the queue in order,
//! so frames reach each session in the order they were published.

use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use synchub_core::types::{EntityId, UserId};
use synchub_db::Store;
use tokio::sync::mpsc;

use crate::metrics::HubMetrics;
use crate::ws::registry::{EnqueueError, SessionRegistry};

// ---------------------------------------------------------------------------
// BroadcastMessage
// ---------------------------------------------------------------------------

/// One frame addressed to some or all sessions of a user.
#[derive(Debug, Clone)]
pub struct BroadcastMessage {
    pub user_id: UserId,
    /// Target devices. Empty means every session of the user.
    pub device_ids: Vec<EntityId>,
    /// Serialized frame, shared by every target.
    pub frame: Utf8Bytes,
    /// Sync item carried by the frame, marked delivered on success.
    pub item_id: Option<EntityId>,
}

impl BroadcastMessage {
    pub fn new(user_id: impl Into<UserId>, frame: impl Into<Utf8Bytes>) -> Self {
        Self {
            user_id: user_id.into(),
            device_ids: Vec::new(),
            frame: frame.into(),
            item_id: None,
        }
    }

    /// Restrict delivery to `device_ids` (empty keeps "all sessions").
    pub fn to_devices(mut self, device_ids: Vec<EntityId>) -> Self {
        self.device_ids = device_ids;
        self
    }

    pub fn for_item(mut self, item_id: EntityId) -> Self {
        self.item_id = Some(item_id);
        self
    }
}

// ---------------------------------------------------------------------------
// Fanout
// ---------------------------------------------------------------------------

/// Cloneable publishing end of the fan-out queue.
///
/// The queue is unbounded; publishing never waits. When every clone is
/// dropped, the worker drains what is queued and exits.
#[derive(Clone)]
pub struct Fanout {
    sender: mpsc::UnboundedSender<BroadcastMessage>,
}

impl Fanout {
    /// Create the queue and its worker. Spawn [`FanoutWorker::run`].
    pub fn new(
        registry: Arc<SessionRegistry>,
        store: Arc<dyn Store>,
        metrics: Arc<HubMetrics>,
    ) -> (Self, FanoutWorker) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = FanoutWorker {
            receiver,
            registry,
            store,
            metrics,
        };
        (Self { sender }, worker)
    }

    /// Queue a message. Returns `false` if the worker is gone.
    pub fn publish(&self, message: BroadcastMessage) -> bool {
        match self.sender.send(message) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(user_id = %e.0.user_id, "Fan-out worker stopped, message dropped");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// FanoutWorker
// ---------------------------------------------------------------------------

/// Outcome of delivering one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Sessions the frame was enqueued into.
    pub enqueued: usize,
    /// Sessions dropped because their buffer was full.
    pub dropped: usize,
}

/// The single consumer of the fan-out queue.
pub struct FanoutWorker {
    receiver: mpsc::UnboundedReceiver<BroadcastMessage>,
    registry: Arc<SessionRegistry>,
    store: Arc<dyn Store>,
    metrics: Arc<HubMetrics>,
}

impl FanoutWorker {
    /// Consume messages until every [`Fanout`] handle is dropped.
    pub async fn run(mut self) {
        tracing::info!("Fan-out worker started");
        while let Some(message) = self.receiver.recv().await {
            deliver(&self.registry, &self.store, &self.metrics, message).await;
        }
        tracing::info!("Fan-out worker stopped");
    }
}

/// Enqueue `message` into every matching session without blocking.
///
/// A session whose buffer is full is dropped from the registry. If at least
/// one enqueue succeeded the carried item is marked delivered on a
/// separate task, so the report can return before the store answers.
pub async fn deliver(
    registry: &SessionRegistry,
    store: &Arc<dyn Store>,
    metrics: &HubMetrics,
    message: BroadcastMessage,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    let sessions = registry.sessions_for_user(&message.user_id).await;

    for session in sessions {
        if !message.device_ids.is_empty() && !message.device_ids.contains(&session.device_id) {
            continue;
        }
        match session.try_enqueue(message.frame.clone()) {
            Ok(()) => report.enqueued += 1,
            Err(EnqueueError::Full) => {
                if registry
                    .drop_if_current(session.device_id, session.session_id)
                    .await
                {
                    metrics.session_dropped_backpressure();
                    report.dropped += 1;
                    tracing::warn!(
                        user_id = %session.user_id,
                        device_id = %session.device_id,
                        "Session buffer full, dropping session",
                    );
                }
            }
            // Closed between snapshot and send.
            Err(EnqueueError::Closed) => {}
        }
    }

    metrics.frames_enqueued(report.enqueued as u64);

    if let Some(item_id) = message.item_id {
        if report.enqueued > 0 {
            // Off the queue: a slow store must not hold up later frames.
            let store = Arc::clone(store);
            tokio::spawn(async move {
                if let Err(e) = store.mark_delivered(item_id).await {
                    tracing::warn!(item_id = %item_id, error = %e, "Failed to mark item delivered");
                }
            });
        }
    }

    tracing::debug!(
        user_id = %message.user_id,
        enqueued = report.enqueued,
        dropped = report.dropped,
        "Fan-out complete",
    );
    report
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
