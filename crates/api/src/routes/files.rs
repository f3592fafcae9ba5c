use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::files;
use crate::state::AppState;

/// Allowance for multipart boundaries and part headers on top of the file.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// File routes mounted at `/files`.
///
/// ```text
/// POST   /upload          -> upload_file
/// DELETE /{id}            -> delete_file
/// GET    /{id}/download   -> download_file
/// ```
pub fn router(max_file_size: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_file_size.saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);

    Router::new()
        .route(
            "/upload",
            post(files::upload_file).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/{id}", delete(files::delete_file))
        .route("/{id}/download", get(files::download_file))
}
