//! In-process [`Store`] backed by hash maps.
//!
//! Mirrors the semantics of [`PgStore`](crate::pg::PgStore), including
//! the `(id, user_id)` filtering and the owner check on register. Used by
//! the HTTP integration tests and for running the hub without PostgreSQL.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use synchub_core::sync_item::{expiry_after, SyncStatus};
use synchub_core::types::{EntityId, UserId};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::models::device::{Device, DevicePatch, NewDevice};
use crate::models::file::{FileObject, NewFile};
use crate::models::sync_item::{ExpiredFile, NewSyncItem, SweepReport, SyncItem};
use crate::store::Store;

#[derive(Default)]
struct Tables {
    devices: HashMap<EntityId, Device>,
    sync_items: HashMap<EntityId, SyncItem>,
    files: HashMap<EntityId, FileObject>,
}

/// Hash-map backed store. All tables sit behind one lock so each
/// operation is atomic.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    default_expiry_hours: i64,
}

impl MemoryStore {
    pub fn new(default_expiry_hours: i64) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            default_expiry_hours,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(synchub_core::sync_item::DEFAULT_EXPIRY_HOURS)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn register_device(&self, device: NewDevice) -> Result<Device, StoreError> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables.devices.get_mut(&device.id) {
            if existing.user_id != device.user_id {
                return Err(StoreError::Conflict(format!(
                    "Device {} is registered to another account",
                    device.id
                )));
            }
            existing.name = device.name;
            existing.device_type = device.device_type;
            existing.platform = device.platform;
            existing.capabilities = device.capabilities;
            existing.last_seen = existing.last_seen.max(now);
            return Ok(existing.clone().with_liveness(now));
        }

        let row = Device {
            id: device.id,
            user_id: device.user_id,
            name: device.name,
            device_type: device.device_type,
            platform: device.platform,
            capabilities: device.capabilities,
            last_seen: now,
            created_at: now,
            is_online: false,
        };
        tables.devices.insert(row.id, row.clone());
        Ok(row.with_liveness(now))
    }

    async fn list_devices(&self, user_id: &str) -> Result<Vec<Device>, StoreError> {
        let now = Utc::now();
        let tables = self.tables.read().await;
        let mut devices: Vec<Device> = tables
            .devices
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .map(|d| d.with_liveness(now))
            .collect();
        devices.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then(a.id.cmp(&b.id)));
        Ok(devices)
    }

    async fn get_device(
        &self,
        user_id: &str,
        id: EntityId,
    ) -> Result<Option<Device>, StoreError> {
        let now = Utc::now();
        let tables = self.tables.read().await;
        Ok(tables
            .devices
            .get(&id)
            .filter(|d| d.user_id == user_id)
            .cloned()
            .map(|d| d.with_liveness(now)))
    }

    async fn update_device(
        &self,
        user_id: &str,
        id: EntityId,
        patch: &DevicePatch,
    ) -> Result<Option<Device>, StoreError> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        let Some(device) = tables.devices.get_mut(&id).filter(|d| d.user_id == user_id) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            device.name = name.clone();
        }
        Ok(Some(device.clone().with_liveness(now)))
    }

    async fn delete_device(&self, user_id: &str, id: EntityId) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let owned = tables.devices.get(&id).is_some_and(|d| d.user_id == user_id);
        if owned {
            tables.devices.remove(&id);
        }
        Ok(owned)
    }

    async fn touch_device(&self, user_id: &str, id: EntityId) -> Result<bool, StoreError> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        match tables.devices.get_mut(&id).filter(|d| d.user_id == user_id) {
            Some(device) => {
                device.last_seen = device.last_seen.max(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn device_owner(&self, id: EntityId) -> Result<Option<UserId>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.devices.get(&id).map(|d| d.user_id.clone()))
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

        let mut tables = self.tables.write().await;
        if tables.sync_items.contains_key(&item.id) {
            return Err(StoreError::Conflict(format!("Sync item {} already exists", item.id)));
        }
        let row = SyncItem {
            id: item.id,
            user_id: item.user_id,
            kind: item.kind,
            content: item.content,
            source_device: item.source_device,
            target_devices: item.target_devices,
            created_at: item.created_at,
            expires_at,
            status: SyncStatus::Pending,
        };
        tables.sync_items.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list_sync_items(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<SyncItem>, StoreError> {
        let now = Utc::now();
        let tables = self.tables.read().await;
        let mut items: Vec<SyncItem> = tables
            .sync_items
            .values()
            .filter(|i| i.user_id == user_id && i.is_live(now))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(limit.max(0) as usize);
        Ok(items)
    }

    async fn get_sync_item(
        &self,
        user_id: &str,
        id: EntityId,
    ) -> Result<Option<SyncItem>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .sync_items
            .get(&id)
            .filter(|i| i.user_id == user_id)
            .cloned())
    }

    async fn mark_delivered(&self, id: EntityId) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.sync_items.get_mut(&id) {
            Some(item) if item.status == SyncStatus::Pending => {
                item.status = SyncStatus::Delivered;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn sweep_expired(&self, retention_grace: Duration) -> Result<SweepReport, StoreError> {
        let now = Utc::now();
        let delete_before = now - retention_grace.max(Duration::zero());
        let mut tables = self.tables.write().await;

        let mut items_expired = 0;
        for item in tables.sync_items.values_mut() {
            if item.expires_at < now && item.status != SyncStatus::Expired {
                item.status = SyncStatus::Expired;
                items_expired += 1;
            }
        }

        let before = tables.sync_items.len();
        tables.sync_items.retain(|_, i| i.expires_at >= delete_before);
        let items_deleted = (before - tables.sync_items.len()) as u64;

        let mut expired_files: Vec<(chrono::DateTime<Utc>, ExpiredFile)> = tables
            .files
            .values()
            .filter(|f| f.expires_at < now)
            .map(|f| {
                (
                    f.expires_at,
                    ExpiredFile {
                        id: f.id,
                        path: f.path.clone(),
                    },
                )
            })
            .collect();
        expired_files.sort_by_key(|(expires_at, _)| *expires_at);

        Ok(SweepReport {
            items_expired,
            items_deleted,
            expired_files: expired_files.into_iter().map(|(_, f)| f).collect(),
        })
    }

    async fn create_file(&self, file: NewFile) -> Result<FileObject, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.files.contains_key(&file.id) {
            return Err(StoreError::Conflict(format!("File {} already exists", file.id)));
        }
        let row = FileObject {
            id: file.id,
            user_id: file.user_id,
            filename: file.filename,
            original_name: file.original_name,
            size: file.size,
            mime_type: file.mime_type,
            path: file.path,
            created_at: Utc::now(),
            expires_at: file.expires_at,
        };
        tables.files.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_file(
        &self,
        user_id: &str,
        id: EntityId,
    ) -> Result<Option<FileObject>, StoreError> {
        let now = Utc::now();
        let tables = self.tables.read().await;
        Ok(tables
            .files
            .get(&id)
            .filter(|f| f.user_id == user_id && f.expires_at > now)
            .cloned())
    }

    async fn delete_file(
        &self,
        user_id: &str,
        id: EntityId,
    ) -> Result<Option<FileObject>, StoreError> {
        let mut tables = self.tables.write().await;
        let owned = tables.files.get(&id).is_some_and(|f| f.user_id == user_id);
        Ok(if owned { tables.files.remove(&id) } else { None })
    }

    async fn delete_file_rows(&self, ids: &[EntityId]) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(ids.iter().filter(|id| tables.files.remove(*id).is_some()).count() as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use synchub_core::sync_item::SyncItemKind;
    use uuid::Uuid;

    use super::*;

    fn new_device(id: EntityId, user_id: &str) -> NewDevice {
        NewDevice {
            id,
            user_id: user_id.to_string(),
            name: "Laptop".to_string(),
            device_type: "laptop".to_string(),
            platform: "linux".to_string(),
            capabilities: vec!["clipboard".to_string()],
        }
    }

    fn new_item(user_id: &str, expires_at: Option<chrono::DateTime<Utc>>) -> NewSyncItem {
        NewSyncItem {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            kind: SyncItemKind::Clipboard,
            content: serde_json::json!({"text": "hello"}),
            source_device: None,
            target_devices: Vec::new(),
            created_at: Utc::now() - Duration::hours(2),
            expires_at,
        }
    }

    #[tokio::test]
    async fn register_is_idempotent_for_owner() {
        let store = MemoryStore::default();
        let id = Uuid::new_v4();

        store.register_device(new_device(id, "u1")).await.unwrap();
        let mut again = new_device(id, "u1");
        again.name = "Renamed".to_string();
        let device = store.register_device(again).await.unwrap();

        assert_eq!(device.name, "Renamed");
        assert!(device.is_online);
        assert_eq!(store.list_devices("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn register_rejects_foreign_owner() {
        let store = MemoryStore::default();
        let id = Uuid::new_v4();

        store.register_device(new_device(id, "u1")).await.unwrap();
        let result = store.register_device(new_device(id, "u2")).await;

        assert_matches!(result, Err(StoreError::Conflict(_)));
        let device = store.get_device("u1", id).await.unwrap().unwrap();
        assert_eq!(device.user_id, "u1");
    }

    #[tokio::test]
    async fn device_ops_filter_by_owner() {
        let store = MemoryStore::default();
        let id = Uuid::new_v4();
        store.register_device(new_device(id, "u1")).await.unwrap();

        assert!(store.get_device("u2", id).await.unwrap().is_none());
        assert!(store.list_devices("u2").await.unwrap().is_empty());
        let patch = DevicePatch {
            name: Some("x".into()),
        };
        assert!(store.update_device("u2", id, &patch).await.unwrap().is_none());
        assert!(!store.touch_device("u2", id).await.unwrap());
        assert!(!store.delete_device("u2", id).await.unwrap());

        assert!(store.delete_device("u1", id).await.unwrap());
        assert!(store.get_device("u1", id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_sync_item_applies_default_expiry() {
        let store = MemoryStore::new(24);
        let item = store.create_sync_item(new_item("u1", None)).await.unwrap();

        assert_eq!(item.expires_at, item.created_at + Duration::hours(24));
        assert_eq!(item.status, SyncStatus::Pending);
    }

    #[tokio::test]
    async fn create_sync_item_rejects_expiry_before_creation() {
        let store = MemoryStore::default();
        let mut item = new_item("u1", None);
        item.expires_at = Some(item.created_at - Duration::minutes(1));

        assert_matches!(store.create_sync_item(item).await, Err(StoreError::Invalid(_)));
    }

    #[tokio::test]
    async fn list_skips_expired_and_other_users() {
        let store = MemoryStore::default();
        store.create_sync_item(new_item("u1", None)).await.unwrap();
        store
            .create_sync_item(new_item("u1", Some(Utc::now() - Duration::minutes(1))))
            .await
            .unwrap();
        store.create_sync_item(new_item("u2", None)).await.unwrap();

        let items = store.list_sync_items("u1", 100).await.unwrap();
        assert_eq!(items.len(), 1);
        assert!(items.iter().all(|i| i.user_id == "u1"));
    }

    #[tokio::test]
    async fn mark_delivered_only_moves_pending() {
        let store = MemoryStore::default();
        let item = store.create_sync_item(new_item("u1", None)).await.unwrap();

        assert!(store.mark_delivered(item.id).await.unwrap());
        assert!(!store.mark_delivered(item.id).await.unwrap());
        let stored = store.get_sync_item("u1", item.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SyncStatus::Delivered);
    }

    #[tokio::test]
    async fn sweep_deletes_expired_items_and_reports_files() {
        let store = MemoryStore::default();
        let live = store.create_sync_item(new_item("u1", None)).await.unwrap();
        let expired = store
            .create_sync_item(new_item("u1", Some(Utc::now() - Duration::minutes(1))))
            .await
            .unwrap();
        let file_id = Uuid::new_v4();
        store
            .create_file(NewFile {
                id: file_id,
                user_id: "u1".into(),
                filename: file_id.to_string(),
                original_name: "a.txt".into(),
                size: 3,
                mime_type: "text/plain".into(),
                path: "/tmp/a".into(),
                expires_at: Utc::now() - Duration::minutes(1),
            })
            .await
            .unwrap();

        let report = store.sweep_expired(Duration::zero()).await.unwrap();

        assert_eq!(report.items_expired, 1);
        assert_eq!(report.items_deleted, 1);
        assert_eq!(
            report.expired_files,
            vec![ExpiredFile {
                id: file_id,
                path: "/tmp/a".into()
            }]
        );
        assert!(store.get_sync_item("u1", expired.id).await.unwrap().is_none());
        assert!(store.get_sync_item("u1", live.id).await.unwrap().is_some());

        // Rows are only removed once the caller confirms.
        assert_eq!(store.delete_file_rows(&[file_id]).await.unwrap(), 1);
        assert!(store.sweep_expired(Duration::zero()).await.unwrap().expired_files.is_empty());
    }

    #[tokio::test]
    async fn sweep_keeps_expired_items_within_grace() {
        let store = MemoryStore::default();
        let item = store
            .create_sync_item(new_item("u1", Some(Utc::now() - Duration::minutes(1))))
            .await
            .unwrap();

        let report = store.sweep_expired(Duration::hours(1)).await.unwrap();

        assert_eq!(report.items_expired, 1);
        assert_eq!(report.items_deleted, 0);
        let stored = store.get_sync_item("u1", item.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SyncStatus::Expired);
    }
}
