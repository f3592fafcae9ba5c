//! Sync item models.

use serde::Serialize;
use sqlx::FromRow;
use synchub_core::sync_item::{SyncItemKind, SyncStatus};
use synchub_core::types::{EntityId, Timestamp, UserId};

/// A row from the `sync_items` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SyncItem {
    pub id: EntityId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub kind: SyncItemKind,
    pub content: serde_json::Value,
    pub source_device: Option<EntityId>,
    pub target_devices: Vec<EntityId>,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    #[sqlx(try_from = "String")]
    pub status: SyncStatus,
}

impl SyncItem {
    /// Whether the item is still visible to listings at `now`.
    pub fn is_live(&self, now: Timestamp) -> bool {
        self.expires_at > now
    }
}

/// Input for creating a sync item. `expires_at` falls back to the store's
/// default expiry when absent.
#[derive(Debug, Clone)]
pub struct NewSyncItem {
    pub id: EntityId,
    pub user_id: UserId,
    pub kind: SyncItemKind,
    pub content: serde_json::Value,
    pub source_device: Option<EntityId>,
    pub target_devices: Vec<EntityId>,
    pub created_at: Timestamp,
    pub expires_at: Option<Timestamp>,
}

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Items whose status moved to `expired` in this sweep.
    pub items_expired: u64,
    /// Items deleted because they were past expiry plus the retention grace.
    pub items_deleted: u64,
    /// File rows past expiry. The caller unlinks the paths, then deletes
    /// the rows with [`Store::delete_file_rows`](crate::store::Store::delete_file_rows).
    pub expired_files: Vec<ExpiredFile>,
}

/// Id and on-disk path of an expired file row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ExpiredFile {
    pub id: EntityId,
    pub path: String,
}
