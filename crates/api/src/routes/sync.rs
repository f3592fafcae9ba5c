use axum::routing::{get, post};
use axum::Router;

use crate::handlers::sync;
use crate::state::AppState;

/// Sync routes mounted at `/sync`.
///
/// ```text
/// POST /clipboard      -> publish_clipboard
/// POST /notification   -> publish_notification
/// POST /files          -> publish_file (501)
/// GET  /items          -> list_items
/// GET  /items/{id}     -> get_item
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/clipboard", post(sync::publish_clipboard))
        .route("/notification", post(sync::publish_notification))
        .route("/files", post(sync::publish_file))
        .route("/items", get(sync::list_items))
        .route("/items/{id}", get(sync::get_item))
}
