//! PostgreSQL-backed [`Store`].

use async_trait::async_trait;
use chrono::{Duration, Utc};
use synchub_core::sync_item::expiry_after;
use synchub_core::types::{EntityId, UserId};

use crate::error::StoreError;
use crate::models::device::{Device, DevicePatch, NewDevice};
use crate::models::file::{FileObject, NewFile};
use crate::models::sync_item::{NewSyncItem, SweepReport, SyncItem};
use crate::repositories::{DeviceRepo, FileRepo, SyncItemRepo};
use crate::store::Store;
use crate::DbPool;

/// [`Store`] implementation over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
    default_expiry_hours: i64,
}

impl PgStore {
    pub fn new(pool: DbPool, default_expiry_hours: i64) -> Self {
        Self {
            pool,
            default_expiry_hours,
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn register_device(&self, device: NewDevice) -> Result<Device, StoreError> {
        let now = Utc::now();
        match DeviceRepo::upsert(&self.pool, &device).await? {
            Some(row) => Ok(row.with_liveness(now)),
            None => Err(StoreError::Conflict(format!(
                "Device {} is registered to another account",
                device.id
            ))),
        }
    }

    async fn list_devices(&self, user_id: &str) -> Result<Vec<Device>, StoreError> {
        let now = Utc::now();
        let devices = DeviceRepo::list_by_user(&self.pool, user_id).await?;
        Ok(devices.into_iter().map(|d| d.with_liveness(now)).collect())
    }

    async fn get_device(
        &self,
        user_id: &str,
        id: EntityId,
    ) -> Result<Option<Device>, StoreError> {
        let now = Utc::now();
        Ok(DeviceRepo::find(&self.pool, user_id, id)
            .await?
            .map(|d| d.with_liveness(now)))
    }

    async fn update_device(
        &self,
        user_id: &str,
        id: EntityId,
        patch: &DevicePatch,
    ) -> Result<Option<Device>, StoreError> {
        let now = Utc::now();
        Ok(DeviceRepo::update(&self.pool, user_id, id, patch)
            .await?
            .map(|d| d.with_liveness(now)))
    }

    async fn delete_device(&self, user_id: &str, id: EntityId) -> Result<bool, StoreError> {
        Ok(DeviceRepo::delete(&self.pool, user_id, id).await?)
    }

    async fn touch_device(&self, user_id: &str, id: EntityId) -> Result<bool, StoreError> {
        Ok(DeviceRepo::touch(&self.pool, user_id, id).await?)
    }

    async fn device_owner(&self, id: EntityId) -> Result<Option<UserId>, StoreError> {
        Ok(DeviceRepo::owner(&self.pool, id).await?)
    }

    async fn create_sync_item(&self, item: NewSyncItem) -> Result<SyncItem, StoreError> {
        let expires_at = item
            .expires_at
            .unwrap_or_else(|| expiry_after(item.created_at, self.default_expiry_hours));
        if expires_at <= item.created_at {
            return Err(StoreError::Invalid(
                "Sync item must expire after it is created".into(),
            ));
        }
        Ok(SyncItemRepo::create(&self.pool, &item, expires_at).await?)
    }

    async fn list_sync_items(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<SyncItem>, StoreError> {
        Ok(SyncItemRepo::list_live(&self.pool, user_id, limit).await?)
    }

    async fn get_sync_item(
        &self,
        user_id: &str,
        id: EntityId,
    ) -> Result<Option<SyncItem>, StoreError> {
        Ok(SyncItemRepo::find(&self.pool, user_id, id).await?)
    }

    async fn mark_delivered(&self, id: EntityId) -> Result<bool, StoreError> {
        Ok(SyncItemRepo::mark_delivered(&self.pool, id).await?)
    }

    async fn sweep_expired(&self, retention_grace: Duration) -> Result<SweepReport, StoreError> {
        let grace_secs = retention_grace.num_milliseconds().max(0) as f64 / 1000.0;

        let mut tx = self.pool.begin().await?;
        let items_expired = SyncItemRepo::mark_expired(&mut *tx).await?;
        let items_deleted = SyncItemRepo::delete_expired(&mut *tx, grace_secs).await?;
        let expired_files = FileRepo::list_expired(&mut *tx).await?;
        tx.commit().await?;

        Ok(SweepReport {
            items_expired,
            items_deleted,
            expired_files,
        })
    }

    async fn create_file(&self, file: NewFile) -> Result<FileObject, StoreError> {
        Ok(FileRepo::create(&self.pool, &file).await?)
    }

    async fn get_file(
        &self,
        user_id: &str,
        id: EntityId,
    ) -> Result<Option<FileObject>, StoreError> {
        Ok(FileRepo::find_live(&self.pool, user_id, id).await?)
    }

    async fn delete_file(
        &self,
        user_id: &str,
        id: EntityId,
    ) -> Result<Option<FileObject>, StoreError> {
        Ok(FileRepo::delete(&self.pool, user_id, id).await?)
    }

    async fn delete_file_rows(&self, ids: &[EntityId]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        Ok(FileRepo::delete_many(&self.pool, ids).await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(crate::health_check(&self.pool).await?)
    }
}
