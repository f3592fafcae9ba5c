//! Bearer-token authentication against the external identity service.
//!
//! [`validator::TokenValidator`] resolves tokens to an [`Identity`] and keeps
//! positive results in a [`cache::Cache`] for a short TTL.

pub mod cache;
pub mod validator;

use serde::{Deserialize, Serialize};
use synchub_core::types::UserId;

pub use cache::{Cache, MemoryCache, NoopCache, RedisCache};
pub use validator::TokenValidator;

/// The identity a token resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Why a token was not accepted.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No token was supplied.
    #[error("missing bearer token")]
    Missing,

    /// The identity service answered `valid=false`.
    #[error("invalid token")]
    Invalid,

    /// The identity service could not be reached, timed out, or returned 5xx.
    #[error("identity service unavailable: {0}")]
    Transient(String),

    /// The identity service rejected the request with a 4xx status.
    #[error("identity service rejected token with status {0}")]
    Permanent(u16),
}

impl AuthError {
    /// Short reason safe to return to clients.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::Missing => "Missing bearer token",
            AuthError::Invalid | AuthError::Permanent(_) => "Invalid or expired token",
            AuthError::Transient(_) => "Authentication service unavailable",
        }
    }
}
