//! The storage seam of the hub.
//!
//! Every operation either commits atomically or fails; no partial writes
//! are observable. Every read and mutation of a user-owned row filters by
//! both the row id and the owning user id, so a mismatched owner looks
//! exactly like a missing row.

use async_trait::async_trait;
use chrono::Duration;
use synchub_core::types::{EntityId, UserId};

use crate::error::StoreError;
use crate::models::device::{Device, DevicePatch, NewDevice};
use crate::models::file::{FileObject, NewFile};
use crate::models::sync_item::{NewSyncItem, SweepReport, SyncItem};

/// Trait for persistence backends.
#[async_trait]
pub trait Store: Send + Sync {
    // -----------------------------------------------------------------------
    // Devices
    // -----------------------------------------------------------------------

    /// Upsert a device by id and mark it seen.
    ///
    /// Fails with [`StoreError::Conflict`] if the id is already registered
    /// to a different user.
    async fn register_device(&self, device: NewDevice) -> Result<Device, StoreError>;

    /// All devices of a user, with `is_online` derived from `last_seen`.
    async fn list_devices(&self, user_id: &str) -> Result<Vec<Device>, StoreError>;

    async fn get_device(&self, user_id: &str, id: EntityId)
        -> Result<Option<Device>, StoreError>;

    /// Apply a patch. Returns `None` if no device `(id, user_id)` exists.
    async fn update_device(
        &self,
        user_id: &str,
        id: EntityId,
        patch: &DevicePatch,
    ) -> Result<Option<Device>, StoreError>;

    /// Returns `true` if a row was deleted.
    async fn delete_device(&self, user_id: &str, id: EntityId) -> Result<bool, StoreError>;

    /// Set `last_seen = now`. Returns `true` if the device exists.
    async fn touch_device(&self, user_id: &str, id: EntityId) -> Result<bool, StoreError>;

    /// Owner of a device id regardless of caller. Only for internal
    /// ownership checks; never surface the result to clients.
    async fn device_owner(&self, id: EntityId) -> Result<Option<UserId>, StoreError>;

    // -----------------------------------------------------------------------
    // Sync items
    // -----------------------------------------------------------------------

    async fn create_sync_item(&self, item: NewSyncItem) -> Result<SyncItem, StoreError>;

    /// Non-expired items of a user, newest first, at most `limit`.
    async fn list_sync_items(&self, user_id: &str, limit: i64)
        -> Result<Vec<SyncItem>, StoreError>;

    async fn get_sync_item(
        &self,
        user_id: &str,
        id: EntityId,
    ) -> Result<Option<SyncItem>, StoreError>;

    /// Move an item from `pending` to `delivered`. Returns `true` if the
    /// status changed.
    async fn mark_delivered(&self, id: EntityId) -> Result<bool, StoreError>;

    /// Expire and delete sync items, and report expired file rows.
    ///
    /// Items past `expires_at` become `expired`; items past
    /// `expires_at + retention_grace` are deleted. File rows are only
    /// reported, not deleted.
    async fn sweep_expired(&self, retention_grace: Duration) -> Result<SweepReport, StoreError>;

    // -----------------------------------------------------------------------
    // Files
    // -----------------------------------------------------------------------

    async fn create_file(&self, file: NewFile) -> Result<FileObject, StoreError>;

    /// A non-expired file owned by `user_id`.
    async fn get_file(&self, user_id: &str, id: EntityId)
        -> Result<Option<FileObject>, StoreError>;

    /// Delete a file row, returning it so the caller can unlink its path.
    async fn delete_file(
        &self,
        user_id: &str,
        id: EntityId,
    ) -> Result<Option<FileObject>, StoreError>;

    /// Delete file rows by id after their paths were unlinked.
    async fn delete_file_rows(&self, ids: &[EntityId]) -> Result<u64, StoreError>;

    // -----------------------------------------------------------------------
    // Health
    // -----------------------------------------------------------------------

    /// Cheap round trip to the backend.
    async fn ping(&self) -> Result<(), StoreError>;
}
