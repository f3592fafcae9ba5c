//! In-memory index of live duplex sessions.

use std::collections::{HashMap, HashSet};

use axum::extract::ws::Utf8Bytes;
use synchub_core::types::{EntityId, Timestamp, UserId};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Frames a session may have queued before it is considered stuck.
pub const EGRESS_CAPACITY: usize = 256;

/// Why a frame could not be enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The egress buffer is at capacity.
    Full,
    /// The session has already been closed.
    Closed,
}

/// A device's live session belongs to a different user.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("device {device_id} has a live session owned by another user")]
pub struct ForeignSession {
    pub device_id: EntityId,
}

/// The registry's view of one live session.
///
/// Cloning is cheap; clones share the egress channel and close signal.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Distinguishes successive sessions of the same device.
    pub session_id: Uuid,
    pub device_id: EntityId,
    pub user_id: UserId,
    pub connected_at: Timestamp,
    egress: mpsc::Sender<Utf8Bytes>,
    closed: CancellationToken,
}

impl SessionHandle {
    /// Create a handle and the receiving end of its egress buffer.
    pub fn new(device_id: EntityId, user_id: UserId) -> (Self, mpsc::Receiver<Utf8Bytes>) {
        let (tx, rx) = mpsc::channel(EGRESS_CAPACITY);
        let handle = Self {
            session_id: Uuid::new_v4(),
            device_id,
            user_id,
            connected_at: chrono::Utc::now(),
            egress: tx,
            closed: CancellationToken::new(),
        };
        (handle, rx)
    }

    /// Nonblocking enqueue. Never waits for buffer space.
    pub fn try_enqueue(&self, frame: Utf8Bytes) -> Result<(), EnqueueError> {
        if self.closed.is_cancelled() {
            return Err(EnqueueError::Closed);
        }
        self.egress.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// Signal both session tasks to stop. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token observed by the session tasks.
    pub fn close_signal(&self) -> CancellationToken {
        self.closed.clone()
    }
}

#[derive(Default)]
struct Indices {
    by_device: HashMap<EntityId, SessionHandle>,
    by_user: HashMap<UserId, HashSet<EntityId>>,
}

impl Indices {
    fn unlink(&mut self, handle: &SessionHandle) {
        if let Some(devices) = self.by_user.get_mut(&handle.user_id) {
            devices.remove(&handle.device_id);
            if devices.is_empty() {
                self.by_user.remove(&handle.user_id);
            }
        }
    }
}

/// Maps devices to their live session, with a per-user secondary index.
///
/// One reader-writer lock covers both indices. Sessions are closed while
/// the write lock is held, so no sender can observe a removed handle as
/// current.
#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<Indices>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handle` as the session for its device.
    ///
    /// An existing session of the same user is closed and returned. A live
    /// session held by another user is left alone and the call is refused.
    pub async fn register(
        &self,
        handle: SessionHandle,
    ) -> Result<Option<SessionHandle>, ForeignSession> {
        let mut inner = self.inner.write().await;
        if inner
            .by_device
            .get(&handle.device_id)
            .is_some_and(|current| current.user_id != handle.user_id)
        {
            return Err(ForeignSession {
                device_id: handle.device_id,
            });
        }
        let replaced = inner.by_device.insert(handle.device_id, handle.clone());
        if let Some(old) = &replaced {
            old.close();
            inner.unlink(old);
        }
        inner
            .by_user
            .entry(handle.user_id.clone())
            .or_default()
            .insert(handle.device_id);
        Ok(replaced)
    }

    /// Remove and close the session of `device_id`. Idempotent.
    pub async fn drop_session(&self, device_id: EntityId) -> bool {
        let mut inner = self.inner.write().await;
        match inner.by_device.remove(&device_id) {
            Some(handle) => {
                handle.close();
                inner.unlink(&handle);
                true
            }
            None => false,
        }
    }

    /// Remove the session of `device_id` only if it is still `session_id`.
    ///
    /// Used by session teardown and fan-out so a stale handle never
    /// removes the session that replaced it.
    pub async fn drop_if_current(&self, device_id: EntityId, session_id: Uuid) -> bool {
        let mut inner = self.inner.write().await;
        let current = inner
            .by_device
            .get(&device_id)
            .is_some_and(|h| h.session_id == session_id);
        if !current {
            return false;
        }
        match inner.by_device.remove(&device_id) {
            Some(handle) => {
                handle.close();
                inner.unlink(&handle);
                true
            }
            None => false,
        }
    }

    /// Point-in-time snapshot of a user's sessions.
    pub async fn sessions_for_user(&self, user_id: &str) -> Vec<SessionHandle> {
        let inner = self.inner.read().await;
        inner
            .by_user
            .get(user_id)
            .map(|devices| {
                devices
                    .iter()
                    .filter_map(|d| inner.by_device.get(d).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// User holding the live session of `device_id`, if any.
    pub async fn owner_of(&self, device_id: EntityId) -> Option<UserId> {
        self.inner
            .read()
            .await
            .by_device
            .get(&device_id)
            .map(|h| h.user_id.clone())
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.by_device.len()
    }

    pub async fn is_online(&self, device_id: EntityId) -> bool {
        self.inner.read().await.by_device.contains_key(&device_id)
    }

    /// Close every session and clear both indices. Returns how many were open.
    pub async fn shutdown_all(&self) -> usize {
        let mut inner = self.inner.write().await;
        let count = inner.by_device.len();
        for handle in inner.by_device.values() {
            handle.close();
        }
        inner.by_device.clear();
        inner.by_user.clear();
        tracing::info!(count, "Closed all sessions");
        count
    }
}
