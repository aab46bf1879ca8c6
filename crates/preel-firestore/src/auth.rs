//! Service-account authentication and access-token caching.
//!
//! Tokens are cached with a refresh margin, refreshed behind a write
//! lock so concurrent requests trigger a single refresh, and kept as a
//! fallback while still usable when a refresh attempt fails.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

/// OAuth scope for the Firestore REST API.
/// Datastore scope covers all document operations.
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Refresh this long before the reported expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Assumed TTL when the provider reports an expiry in the past or none
/// at all. OAuth tokens usually live 60 minutes.
const FALLBACK_TTL: Duration = Duration::from_secs(50 * 60);

/// Load a token provider from service-account credentials in the
/// environment (`GOOGLE_APPLICATION_CREDENTIALS` path or inline JSON).
pub fn service_account_provider() -> FirestoreResult<Arc<dyn TokenProvider>> {
    let account = CustomServiceAccount::from_env().map_err(|e| {
        FirestoreError::auth_error(format!("failed to load service account: {}", e))
    })?;

    match account {
        Some(sa) => Ok(Arc::new(sa)),
        None => Err(FirestoreError::auth_error(
            "GOOGLE_APPLICATION_CREDENTIALS not set. \
             Point it at a service account JSON file.",
        )),
    }
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    /// Still valid with the refresh margin applied
    fn fresh(&self) -> bool {
        Instant::now() + REFRESH_MARGIN < self.expires_at
    }

    /// Not yet expired, even if a refresh is already due
    fn usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Thread-safe access-token cache with single-flight refresh.
pub struct TokenCache {
    auth: Arc<dyn TokenProvider>,
    slot: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(auth: Arc<dyn TokenProvider>) -> Self {
        Self {
            auth,
            slot: RwLock::new(None),
        }
    }

    /// Drop the cached token so the next `get` refreshes.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }

    /// Return a valid access token, refreshing if needed.
    pub async fn get(&self) -> FirestoreResult<String> {
        // Fast path under the read lock
        {
            let slot = self.slot.read().await;
            if let Some(cached) = slot.as_ref() {
                if cached.fresh() {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let mut slot = self.slot.write().await;

        // Another task may have refreshed while we waited for the lock
        if let Some(cached) = slot.as_ref() {
            if cached.fresh() {
                return Ok(cached.access_token.clone());
            }
        }

        match self.auth.token(&[FIRESTORE_SCOPE]).await {
            Ok(token) => {
                let access_token = token.as_str().to_string();
                *slot = Some(CachedToken {
                    access_token: access_token.clone(),
                    expires_at: Self::expiry_instant(token.expires_at()),
                });
                debug!("refreshed Firestore access token");
                Ok(access_token)
            }
            Err(e) => {
                // A stale-but-usable token beats failing the request
                if let Some(cached) = slot.as_ref() {
                    if cached.usable() {
                        warn!("token refresh failed, reusing current token: {}", e);
                        return Ok(cached.access_token.clone());
                    }
                }
                Err(FirestoreError::auth_error(format!(
                    "failed to obtain access token: {}",
                    e
                )))
            }
        }
    }

    fn expiry_instant(expires_at: chrono::DateTime<Utc>) -> Instant {
        let now = Utc::now();
        if expires_at > now {
            match (expires_at - now).to_std() {
                Ok(ttl) => Instant::now() + ttl,
                Err(_) => Instant::now() + FALLBACK_TTL,
            }
        } else {
            // Expiry already in the past forces a refresh on next use
            Instant::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freshness_window() {
        let token = CachedToken {
            access_token: "t".to_string(),
            expires_at: Instant::now() + Duration::from_secs(300),
        };
        assert!(token.fresh());
        assert!(token.usable());

        let expiring = CachedToken {
            access_token: "t".to_string(),
            expires_at: Instant::now() + Duration::from_secs(30),
        };
        // Inside the refresh margin but not yet expired
        assert!(!expiring.fresh());
        assert!(expiring.usable());
    }

    #[test]
    fn test_expiry_instant_past_forces_refresh() {
        let past = Utc::now() - chrono::Duration::minutes(5);
        let instant = TokenCache::expiry_instant(past);
        assert!(instant <= Instant::now());
    }
}
