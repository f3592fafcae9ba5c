//! Domain errors raised before anything touches storage.
//!
//! Store conflicts live on `synchub_db::StoreError` and auth failures on
//! the API's `AuthError`; this enum only covers what the domain rules and
//! handlers decide on their own.

use crate::types::EntityId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An owned entity is absent, or belongs to someone else.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: EntityId },

    /// Input that parses but breaks a domain rule.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The request is well-formed but refused outright (e.g. a remote origin).
    #[error("Forbidden: {0}")]
    Forbidden(String),
}
