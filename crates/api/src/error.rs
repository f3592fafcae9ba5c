use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use synchub_core::error::CoreError;
use synchub_db::StoreError;

use crate::auth::AuthError;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain, store and auth errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce `{"error", "code"}` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An upload exceeded `MAX_FILE_SIZE`.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Shorthand for a 404 on an owned entity.
    pub fn not_found(entity: &'static str, id: synchub_core::types::EntityId) -> Self {
        AppError::Core(CoreError::NotFound { entity, id })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, .. } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            },

            // --- Store errors ---
            AppError::Store(err) => match err {
                StoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                StoreError::Invalid(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                StoreError::Database(e) => {
                    tracing::error!(error = %e, "Database error");
                    internal()
                }
            },

            // --- Auth errors ---
            AppError::Auth(err) => {
                if let AuthError::Transient(reason) = err {
                    tracing::warn!(kind = "transient", error = %reason, "Identity service unavailable");
                }
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", err.public_message().to_string())
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg.clone())
            }
            AppError::NotImplemented(msg) => {
                (StatusCode::NOT_IMPLEMENTED, "NOT_IMPLEMENTED", msg.clone())
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        INTERNAL_MESSAGE.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use uuid::Uuid;

    use super::*;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn not_found_does_not_leak_the_id() {
        let id = Uuid::new_v4();
        let (status, body) = render(AppError::not_found("Device", id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
        assert!(!body["error"].as_str().unwrap().contains(&id.to_string()));
    }

    #[tokio::test]
    async fn core_errors_map_by_kind() {
        let (status, body) =
            render(AppError::Core(CoreError::Validation("bad kind".into()))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, body) =
            render(AppError::Core(CoreError::Forbidden("Origin not allowed".into()))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Origin not allowed");
    }

    #[tokio::test]
    async fn store_errors_map_by_kind() {
        let (status, _) = render(StoreError::Conflict("taken".into()).into()).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = render(StoreError::Invalid("bad expiry".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = render(StoreError::Database(sqlx::Error::PoolTimedOut).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], INTERNAL_MESSAGE);
    }

    #[tokio::test]
    async fn every_auth_error_is_unauthorized() {
        for err in [
            AuthError::Missing,
            AuthError::Invalid,
            AuthError::Transient("timeout".into()),
            AuthError::Permanent(403),
        ] {
            let (status, body) = render(err.into()).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["code"], "UNAUTHORIZED");
        }
    }

    #[tokio::test]
    async fn payload_too_large_and_not_implemented() {
        let (status, body) = render(AppError::PayloadTooLarge("too big".into())).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");

        let (status, _) = render(AppError::NotImplemented("reserved".into())).await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    }
}
