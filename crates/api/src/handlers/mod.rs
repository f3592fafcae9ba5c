pub mod devices;
pub mod files;
pub mod sync;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Unwrap a JSON body. Any rejection (syntax, missing field, wrong type)
/// becomes a 400.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

/// Run field validation on a request body, mapping failures to 400.
pub(crate) fn validate_body<T: Validate>(input: &T) -> AppResult<()> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}
