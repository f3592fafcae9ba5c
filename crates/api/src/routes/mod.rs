pub mod devices;
pub mod files;
pub mod health;
pub mod sync;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Every route authenticates through the `AuthUser` extractor.
///
/// ```text
/// /devices                      list, register
/// /devices/{id}                 get, update, delete
///
/// /sync/clipboard               publish clipboard (POST)
/// /sync/notification            publish notification (POST)
/// /sync/files                   reserved (POST, 501)
/// /sync/items                   recent items (GET)
/// /sync/items/{id}              single item (GET)
///
/// /files/upload                 multipart upload (POST)
/// /files/{id}                   delete (DELETE)
/// /files/{id}/download          stream bytes (GET)
/// ```
pub fn api_routes(max_file_size: u64) -> Router<AppState> {
    Router::new()
        .nest("/devices", devices::router())
        .nest("/sync", sync::router())
        .nest("/files", files::router(max_file_size))
}
