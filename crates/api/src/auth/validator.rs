//! Token validation with positive-result caching.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use synchub_core::types::Timestamp;

use super::cache::Cache;
use super::{AuthError, Identity};
use crate::metrics::HubMetrics;

const CACHE_KEY_PREFIX: &str = "synchub:token:";

/// Cached payload for one validated token.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedUser {
    user_id: String,
    email: String,
    roles: Vec<String>,
    fetched_at: Timestamp,
}

impl CachedUser {
    fn is_fresh(&self, now: Timestamp, ttl: Duration) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now - self.fetched_at < ttl,
            Err(_) => true,
        }
    }
}

#[derive(Serialize)]
struct ValidateRequest<'a> {
    token: &'a str,
}

#[derive(Deserialize)]
struct ValidateResponse {
    valid: bool,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
}

/// Resolves bearer tokens through `POST {AUTH_SERVICE_URL}/validate`.
///
/// Safe to share between tasks. Concurrent misses for the same token may
/// each call the identity service; only `valid=true` answers are cached.
pub struct TokenValidator {
    client: reqwest::Client,
    validate_url: String,
    cache: Arc<dyn Cache>,
    ttl: Duration,
    metrics: Arc<HubMetrics>,
}

impl TokenValidator {
    pub fn new(
        auth_service_url: &str,
        timeout: Duration,
        cache: Arc<dyn Cache>,
        ttl: Duration,
        metrics: Arc<HubMetrics>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            validate_url: format!("{}/validate", auth_service_url.trim_end_matches('/')),
            cache,
            ttl,
            metrics,
        })
    }

    /// Resolve `token` to an identity, consulting the cache first.
    pub async fn validate(&self, token: &str) -> Result<Identity, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::Missing);
        }

        let key = format!("{CACHE_KEY_PREFIX}{token}");
        if let Some(identity) = self.cached(&key).await {
            self.metrics.auth_cache_hit();
            return Ok(identity);
        }
        self.metrics.auth_cache_miss();

        let identity = self.fetch(token).await?;
        self.store(&key, &identity).await;
        Ok(identity)
    }

    async fn cached(&self, key: &str) -> Option<Identity> {
        let raw = match self.cache.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, "Token cache read failed");
                return None;
            }
        };
        let entry: CachedUser = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding malformed token cache entry");
                return None;
            }
        };
        if !entry.is_fresh(Utc::now(), self.ttl) {
            return None;
        }
        Some(Identity {
            user_id: entry.user_id,
            email: entry.email,
            roles: entry.roles,
        })
    }

    async fn fetch(&self, token: &str) -> Result<Identity, AuthError> {
        let response = self
            .client
            .post(&self.validate_url)
            .json(&ValidateRequest { token })
            .send()
            .await
            .map_err(|e| AuthError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(AuthError::Permanent(status.as_u16()));
        }
        if !status.is_success() {
            return Err(AuthError::Transient(format!("identity service returned {status}")));
        }

        let body: ValidateResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Transient(format!("malformed identity response: {e}")))?;

        match body.user_id {
            Some(user_id) if body.valid && !user_id.is_empty() => Ok(Identity {
                user_id,
                email: body.email.unwrap_or_default(),
                roles: body.roles,
            }),
            _ => Err(AuthError::Invalid),
        }
    }

    async fn store(&self, key: &str, identity: &Identity) {
        let entry = CachedUser {
            user_id: identity.user_id.clone(),
            email: identity.email.clone(),
            roles: identity.roles.clone(),
            fetched_at: Utc::now(),
        };
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode token cache entry");
                return;
            }
        };
        if let Err(e) = self.cache.set_with_ttl(key, &raw, self.ttl).await {
            tracing::warn!(error = %e, "Token cache write failed");
        }
    }
}
