//! Publish and listing handlers for sync items.
//!
//! A publish persists the item first, then queues it for fan-out, so a
//! device that misses the live frame can still fetch it from
//! `GET /sync/items`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use synchub_core::frames::ServerFrame;
use synchub_core::sync_item::{
    clamp_list_limit, clipboard_content, notification_content, SyncItemKind,
};
use synchub_core::types::EntityId;
use synchub_db::models::sync_item::{NewSyncItem, SyncItem};
use uuid::Uuid;
use validator::Validate;

use super::{json_body, validate_body};
use crate::error::{AppError, AppResult};
use crate::fanout::BroadcastMessage;
use crate::middleware::auth::AuthUser;
use crate::query::ListItemsParams;
use crate::state::AppState;

/// Body of `POST /api/v1/sync/clipboard`.
#[derive(Debug, Deserialize, Validate)]
pub struct ClipboardRequest {
    /// Clipboard text, at most 1 MiB.
    #[validate(length(max = 1048576))]
    pub content: String,
    pub source_device: Option<EntityId>,
    /// Empty means every device of the caller.
    #[serde(default)]
    pub target_devices: Vec<EntityId>,
}

/// Body of `POST /api/v1/sync/notification`.
#[derive(Debug, Deserialize, Validate)]
pub struct NotificationRequest {
    #[validate(length(min = 1, max = 512))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 8192))]
    pub body: String,
    #[validate(length(max = 2048))]
    pub icon: Option<String>,
    pub source_device: Option<EntityId>,
    #[serde(default)]
    pub target_devices: Vec<EntityId>,
}

/// POST /api/v1/sync/clipboard
pub async fn publish_clipboard(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<ClipboardRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let input = json_body(payload)?;
    validate_body(&input)?;

    let item = publish(
        &state,
        &user,
        SyncItemKind::Clipboard,
        clipboard_content(&input.content),
        input.source_device,
        input.target_devices,
        |data| ServerFrame::ClipboardSync { data },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

/// POST /api/v1/sync/notification
pub async fn publish_notification(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<NotificationRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let input = json_body(payload)?;
    validate_body(&input)?;

    let item = publish(
        &state,
        &user,
        SyncItemKind::Notification,
        notification_content(&input.title, &input.body, input.icon.as_deref()),
        input.source_device,
        input.target_devices,
        |data| ServerFrame::NotificationSync { data },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

/// POST /api/v1/sync/files
///
/// Reserved for file-ref publishing.
pub async fn publish_file(_user: AuthUser) -> AppResult<StatusCode> {
    Err(AppError::NotImplemented(
        "File sync is not implemented".into(),
    ))
}

/// GET /api/v1/sync/items
///
/// Recent non-expired items of the caller, newest first.
pub async fn list_items(
    user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<ListItemsParams>,
) -> AppResult<impl IntoResponse> {
    let limit = clamp_list_limit(params.limit);
    let items = state.store.list_sync_items(&user.user_id, limit).await?;
    Ok(Json(items))
}

/// GET /api/v1/sync/items/{id}
pub async fn get_item(
    user: AuthUser,
    State(state): State<AppState>,
    Path(item_id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    let item = state
        .store
        .get_sync_item(&user.user_id, item_id)
        .await?
        .ok_or(AppError::not_found("SyncItem", item_id))?;

    Ok(Json(item))
}

/// Persist an item and queue its frame for fan-out.
///
/// The source and every target must be devices of the caller.
async fn publish(
    state: &AppState,
    user: &AuthUser,
    kind: SyncItemKind,
    content: serde_json::Value,
    source_device: Option<EntityId>,
    mut target_devices: Vec<EntityId>,
    frame: fn(serde_json::Value) -> ServerFrame,
) -> AppResult<SyncItem> {
    target_devices.sort_unstable();
    target_devices.dedup();

    for device_id in source_device.iter().chain(target_devices.iter()) {
        if state
            .store
            .get_device(&user.user_id, *device_id)
            .await?
            .is_none()
        {
            return Err(AppError::not_found("Device", *device_id));
        }
    }

    let item = state
        .store
        .create_sync_item(NewSyncItem {
            id: Uuid::new_v4(),
            user_id: user.user_id.clone(),
            kind,
            content,
            source_device,
            target_devices: target_devices.clone(),
            created_at: Utc::now(),
            expires_at: None,
        })
        .await?;

    let data = serde_json::to_value(&item).map_err(|e| AppError::InternalError(e.to_string()))?;
    let encoded = frame(data)
        .encode()
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    state.fanout.publish(
        BroadcastMessage::new(user.user_id.clone(), encoded)
            .to_devices(target_devices)
            .for_item(item.id),
    );
    state.metrics.item_published();

    tracing::info!(
        user_id = %user.user_id,
        item_id = %item.id,
        kind = %kind,
        targets = item.target_devices.len(),
        "Sync item published",
    );

    Ok(item)
}
