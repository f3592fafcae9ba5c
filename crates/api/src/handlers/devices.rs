//! Handlers for device registration and management.
//!
//! Every operation is scoped to the authenticated user; a device owned by
//! someone else is reported as not found.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use synchub_core::device::normalize_capabilities;
use synchub_core::types::EntityId;
use synchub_db::models::device::{DevicePatch, NewDevice};
use uuid::Uuid;
use validator::Validate;

use super::{json_body, validate_body};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Body of `POST /api/v1/devices`.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterDeviceRequest {
    /// Client-chosen id. A new one is minted when absent.
    #[serde(default)]
    pub id: Option<EntityId>,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(rename = "type", default)]
    #[validate(length(max = 64))]
    pub device_type: String,
    #[serde(default)]
    #[validate(length(max = 64))]
    pub platform: String,
    #[serde(default)]
    #[validate(length(max = 64))]
    pub capabilities: Vec<String>,
}

/// Body of `PUT /api/v1/devices/{id}`. Only `name` is applied; other
/// fields are ignored.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateDeviceRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
}

fn non_blank_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Device name must not be blank".into()));
    }
    Ok(name.to_string())
}

/// GET /api/v1/devices
pub async fn list_devices(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let devices = state.store.list_devices(&user.user_id).await?;
    Ok(Json(devices))
}

/// POST /api/v1/devices
///
/// Idempotent upsert by id. Fails with 409 if the id belongs to another user.
pub async fn register_device(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<RegisterDeviceRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let input = json_body(payload)?;
    validate_body(&input)?;
    let name = non_blank_name(&input.name)?;

    let device = state
        .store
        .register_device(NewDevice {
            id: input.id.unwrap_or_else(Uuid::new_v4),
            user_id: user.user_id.clone(),
            name,
            device_type: input.device_type,
            platform: input.platform,
            capabilities: normalize_capabilities(input.capabilities),
        })
        .await?;

    tracing::info!(
        user_id = %user.user_id,
        device_id = %device.id,
        device_type = %device.device_type,
        "Device registered",
    );

    Ok((StatusCode::CREATED, Json(device)))
}

/// GET /api/v1/devices/{id}
pub async fn get_device(
    user: AuthUser,
    State(state): State<AppState>,
    Path(device_id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    let device = state
        .store
        .get_device(&user.user_id, device_id)
        .await?
        .ok_or(AppError::not_found("Device", device_id))?;

    Ok(Json(device))
}

/// PUT /api/v1/devices/{id}
pub async fn update_device(
    user: AuthUser,
    State(state): State<AppState>,
    Path(device_id): Path<EntityId>,
    payload: Result<Json<UpdateDeviceRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let input = json_body(payload)?;
    validate_body(&input)?;

    let patch = DevicePatch {
        name: input.name.as_deref().map(non_blank_name).transpose()?,
    };
    state
        .store
        .update_device(&user.user_id, device_id, &patch)
        .await?
        .ok_or(AppError::not_found("Device", device_id))?;

    tracing::info!(user_id = %user.user_id, device_id = %device_id, "Device updated");

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/devices/{id}
///
/// Also closes the device's live session, if any.
pub async fn delete_device(
    user: AuthUser,
    State(state): State<AppState>,
    Path(device_id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    if !state.store.delete_device(&user.user_id, device_id).await? {
        return Err(AppError::not_found("Device", device_id));
    }

    let had_session = state.registry.drop_session(device_id).await;

    tracing::info!(
        user_id = %user.user_id,
        device_id = %device_id,
        had_session,
        "Device deleted",
    );

    Ok(StatusCode::NO_CONTENT)
}
