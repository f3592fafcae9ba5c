//! Uploaded file metadata.

use serde::Serialize;
use sqlx::FromRow;
use synchub_core::types::{EntityId, Timestamp, UserId};

/// A row from the `files` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FileObject {
    pub id: EntityId,
    pub user_id: UserId,
    pub filename: String,
    pub original_name: String,
    pub size: i64,
    pub mime_type: String,
    /// On-disk location. Never serialized to clients.
    #[serde(skip_serializing)]
    pub path: String,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

/// Input for recording an uploaded file.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub id: EntityId,
    pub user_id: UserId,
    pub filename: String,
    pub original_name: String,
    pub size: i64,
    pub mime_type: String,
    pub path: String,
    pub expires_at: Timestamp,
}
