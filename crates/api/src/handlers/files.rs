//! Upload and download of stored files.
//!
//! Uploads are streamed to `<STORAGE_PATH>/<uuid>` chunk by chunk and
//! never buffered whole in memory.

use std::path::Path as FsPath;

use axum::body::Body;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use synchub_core::sync_item::expiry_after;
use synchub_core::types::EntityId;
use synchub_db::models::file::{FileObject, NewFile};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Response of a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    #[serde(flatten)]
    pub file: FileObject,
    pub download_url: String,
}

/// POST /api/v1/files/upload
///
/// Expects a multipart body with a `file` field. Returns 413 when the file
/// exceeds `MAX_FILE_SIZE`.
pub async fn upload_file(
    user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = sanitize_filename(field.file_name().unwrap_or(""));
        let mime_type = field
            .content_type()
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();

        let id = Uuid::new_v4();
        let path = state.storage.path_for(id);

        let size = match write_field(&mut field, &path, state.config.max_file_size).await {
            Ok(size) => size,
            Err(e) => {
                discard(&state, &path).await;
                return Err(e);
            }
        };

        let created = state
            .store
            .create_file(NewFile {
                id,
                user_id: user.user_id.clone(),
                filename: id.to_string(),
                original_name,
                size: size as i64,
                mime_type,
                path: path.to_string_lossy().into_owned(),
                expires_at: expiry_after(Utc::now(), state.config.default_expiry_hours),
            })
            .await;
        let file = match created {
            Ok(file) => file,
            Err(e) => {
                discard(&state, &path).await;
                return Err(e.into());
            }
        };

        tracing::info!(
            user_id = %user.user_id,
            file_id = %file.id,
            size = file.size,
            mime_type = %file.mime_type,
            "File uploaded",
        );

        let download_url = format!("/api/v1/files/{}/download", file.id);
        return Ok((StatusCode::CREATED, Json(UploadResponse { file, download_url })));
    }

    Err(AppError::BadRequest("Missing required 'file' field".into()))
}

/// GET /api/v1/files/{id}/download
pub async fn download_file(
    user: AuthUser,
    State(state): State<AppState>,
    Path(file_id): Path<EntityId>,
) -> AppResult<Response> {
    let file = state
        .store
        .get_file(&user.user_id, file_id)
        .await?
        .ok_or(AppError::not_found("File", file_id))?;

    let handle = match tokio::fs::File::open(&file.path).await {
        Ok(handle) => handle,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(file_id = %file.id, "File row exists but bytes are missing");
            return Err(AppError::not_found("File", file_id));
        }
        Err(e) => return Err(AppError::InternalError(e.to_string())),
    };
    let length = handle
        .metadata()
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .len();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, file.mime_type.as_str())
        .header(header::CONTENT_LENGTH, length.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file.original_name),
        )
        .body(Body::from_stream(ReaderStream::new(handle)))
        .map_err(|e| AppError::InternalError(e.to_string()))
}

/// DELETE /api/v1/files/{id}
///
/// Deletes the row first, then the bytes.
pub async fn delete_file(
    user: AuthUser,
    State(state): State<AppState>,
    Path(file_id): Path<EntityId>,
) -> AppResult<StatusCode> {
    let file = state
        .store
        .delete_file(&user.user_id, file_id)
        .await?
        .ok_or(AppError::not_found("File", file_id))?;

    if let Err(e) = state.storage.remove(&file.path).await {
        tracing::warn!(file_id = %file.id, error = %e, "Failed to remove deleted file");
    }

    tracing::info!(user_id = %user.user_id, file_id = %file.id, "File deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Stream a multipart field to `path`, enforcing `max_size` bytes.
async fn write_field(field: &mut Field<'_>, path: &FsPath, max_size: u64) -> AppResult<u64> {
    let mut out = tokio::fs::File::create(path)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    let mut written: u64 = 0;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        written += chunk.len() as u64;
        if written > max_size {
            return Err(AppError::PayloadTooLarge(format!(
                "File exceeds the maximum size of {max_size} bytes"
            )));
        }
        out.write_all(&chunk)
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;
    }

    out.flush()
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    Ok(written)
}

async fn discard(state: &AppState, path: &FsPath) {
    if let Err(e) = state.storage.remove(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial upload");
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

/// Reduce a client-supplied name to a safe final path component without
/// quotes or control characters.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(&['/', '\\'][..]).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
