//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// `?limit=` for item listings. Clamped to `1..=100` by the handler.
#[derive(Debug, Deserialize)]
pub struct ListItemsParams {
    pub limit: Option<i64>,
}

/// `?token=&device_id=` on the session handshake.
#[derive(Debug, Deserialize)]
pub struct SessionParams {
    pub token: Option<String>,
    pub device_id: Option<uuid::Uuid>,
}
