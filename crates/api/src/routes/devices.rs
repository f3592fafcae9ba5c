use axum::routing::get;
use axum::Router;

use crate::handlers::devices;
use crate::state::AppState;

/// Device routes mounted at `/devices`.
///
/// ```text
/// GET    /       -> list_devices
/// POST   /       -> register_device
/// GET    /{id}   -> get_device
/// PUT    /{id}   -> update_device
/// DELETE /{id}   -> delete_device
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(devices::list_devices).post(devices::register_device),
        )
        .route(
            "/{id}",
            get(devices::get_device)
                .put(devices::update_device)
                .delete(devices::delete_device),
        )
}
