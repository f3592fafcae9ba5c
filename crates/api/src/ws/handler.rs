use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::header::ORIGIN;
use axum::http::HeaderMap;
use axum::response::Response;
use synchub_core::error::CoreError;
use synchub_core::frames::ServerFrame;
use synchub_core::types::{EntityId, UserId};
use uuid::Uuid;

use crate::auth::AuthError;
use crate::error::{AppError, AppResult};
use crate::query::SessionParams;
use crate::state::AppState;
use crate::ws::registry::SessionHandle;
use crate::ws::session::{self, SessionContext};

/// GET /ws?token=...&device_id=...
///
/// The token travels in the query string because browser WebSocket clients
/// cannot set an `Authorization` header. Only localhost origins are
/// admitted. Without `device_id` a fresh id is minted for the session.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<SessionParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    if let Some(origin) = headers.get(ORIGIN) {
        let allowed = origin.to_str().map(is_local_origin).unwrap_or(false);
        if !allowed {
            return Err(AppError::Core(CoreError::Forbidden(
                "Origin not allowed".into(),
            )));
        }
    }

    let token = params.token.ok_or(AuthError::Missing)?;
    let identity = state.validator.validate(&token).await?;

    let device_id = match params.device_id {
        Some(id) => {
            let owner = state.store.device_owner(id).await?;
            if owner.is_some_and(|owner| owner != identity.user_id) {
                return Err(AppError::not_found("Device", id));
            }
            // An unregistered id can still be held live by someone else.
            let live_owner = state.registry.owner_of(id).await;
            if live_owner.is_some_and(|owner| owner != identity.user_id) {
                return Err(AppError::not_found("Device", id));
            }
            id
        }
        None => Uuid::new_v4(),
    };

    let user_id = identity.user_id;
    Ok(ws.on_upgrade(move |socket| open_session(socket, state, user_id, device_id)))
}

/// Register the session, greet the device, then run it to completion.
async fn open_session(socket: WebSocket, state: AppState, user_id: UserId, device_id: EntityId) {
    let (handle, egress) = SessionHandle::new(device_id, user_id.clone());

    match (ServerFrame::Connected { device_id }).encode() {
        Ok(json) => {
            let _ = handle.try_enqueue(json.into());
        }
        Err(e) => tracing::warn!(error = %e, "Failed to encode connected frame"),
    }

    match state.registry.register(handle.clone()).await {
        Ok(Some(old)) => {
            state.metrics.session_replaced();
            tracing::info!(
                device_id = %device_id,
                replaced_session_id = %old.session_id,
                "Replaced existing session",
            );
        }
        Ok(None) => {}
        // Another user's session claimed the device after the handshake check.
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "Refusing session");
            let mut socket = socket;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    }
    state.metrics.session_opened();

    if let Err(e) = state.store.touch_device(&user_id, device_id).await {
        tracing::warn!(device_id = %device_id, error = %e, "Failed to update last_seen on session open");
    }

    tracing::info!(
        user_id = %user_id,
        device_id = %device_id,
        session_id = %handle.session_id,
        "Session opened",
    );

    let ctx = SessionContext {
        registry: state.registry.clone(),
        store: state.store.clone(),
        timing: state.session_timing,
    };
    // A live session must not keep the fan-out queue open.
    drop(state);
    session::run(socket, handle, egress, ctx).await;
}

/// Whether an `Origin` header names a loopback host.
fn is_local_origin(origin: &str) -> bool {
    let Some((_, rest)) = origin.split_once("://") else {
        return false;
    };
    let authority = rest.split('/').next().unwrap_or("");
    let host = if let Some(bracketed) = authority.strip_prefix('[') {
        match bracketed.split_once(']') {
            Some((host, _)) => host,
            None => return false,
        }
    } else {
        authority.split(':').next().unwrap_or("")
    };
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}
