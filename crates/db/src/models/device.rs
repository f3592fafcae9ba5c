//! Device models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use synchub_core::types::{EntityId, Timestamp, UserId};

/// A row from the `devices` table.
///
/// `is_online` is not stored; stores derive it from `last_seen` when the
/// row is read.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Device {
    pub id: EntityId,
    pub user_id: UserId,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub platform: String,
    pub capabilities: Vec<String>,
    pub last_seen: Timestamp,
    pub created_at: Timestamp,
    #[sqlx(skip)]
    pub is_online: bool,
}

impl Device {
    /// Fill in `is_online` relative to `now`.
    pub fn with_liveness(mut self, now: Timestamp) -> Self {
        self.is_online = synchub_core::device::is_online(self.last_seen, now);
        self
    }
}

/// Input for registering (upserting) a device.
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub id: EntityId,
    pub user_id: UserId,
    pub name: String,
    pub device_type: String,
    pub platform: String,
    pub capabilities: Vec<String>,
}

/// Mutable fields of a device. Only the name may change after registration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DevicePatch {
    pub name: Option<String>,
}
