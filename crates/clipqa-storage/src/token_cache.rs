//! Service-account access tokens for the Drive API.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};

/// Refresh 60 seconds before expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// TTL assumed when the provider reports an unusable expiry.
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Supplies bearer tokens to HTTP clients.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> StorageResult<String>;
}

/// A fixed token. Used with emulators and in tests.
pub struct StaticToken(pub String);

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> StorageResult<String> {
        Ok(self.0.clone())
    }
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Single-flight token cache over a `gcp_auth` provider.
///
/// A failed refresh falls back to the cached token while it has not
/// actually expired.
pub struct TokenCache {
    auth: Arc<dyn TokenProvider>,
    scopes: Vec<&'static str>,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(auth: Arc<dyn TokenProvider>, scopes: Vec<&'static str>) -> Self {
        Self {
            auth,
            scopes,
            cache: RwLock::new(None),
        }
    }

    /// Service account from `GOOGLE_APPLICATION_CREDENTIALS`, Drive scope.
    pub fn drive_from_env() -> StorageResult<Self> {
        let service_account = CustomServiceAccount::from_env()
            .map_err(|e| StorageError::auth_error(format!("Failed to load service account: {}", e)))?
            .ok_or_else(|| {
                StorageError::auth_error(
                    "GOOGLE_APPLICATION_CREDENTIALS not set. \
                     Set it to the path of your service account JSON file.",
                )
            })?;

        Ok(Self::new(Arc::new(service_account), vec![DRIVE_SCOPE]))
    }

    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    pub async fn get_token(&self) -> StorageResult<String> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.is_valid()) {
                return Ok(cached.access_token.clone());
            }
        }

        let mut cache = self.cache.write().await;

        // another task may have refreshed while we waited
        if let Some(cached) = cache.as_ref().filter(|c| c.is_valid()) {
            return Ok(cached.access_token.clone());
        }

        self.refresh_token(&mut cache).await
    }

    async fn refresh_token(&self, cache: &mut Option<CachedToken>) -> StorageResult<String> {
        match self.auth.token(&self.scopes).await {
            Ok(token) => {
                let access_token = token.as_str().to_string();

                let now = Utc::now();
                let exp = token.expires_at();
                let expires_at = if exp > now {
                    Instant::now() + (exp - now).to_std().unwrap_or(TOKEN_DEFAULT_TTL)
                } else {
                    Instant::now()
                };

                *cache = Some(CachedToken {
                    access_token: access_token.clone(),
                    expires_at,
                });

                debug!("Refreshed Drive access token");
                Ok(access_token)
            }
            Err(e) => {
                if let Some(cached) = cache.as_ref().filter(|c| c.is_usable()) {
                    warn!("Token refresh failed, using existing token: {}", e);
                    return Ok(cached.access_token.clone());
                }

                Err(StorageError::auth_error(format!("Failed to obtain auth token: {}", e)))
            }
        }
    }
}

#[async_trait]
impl AccessTokenSource for TokenCache {
    async fn access_token(&self) -> StorageResult<String> {
        self.get_token().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_token_validity_uses_margin() {
        let soon = CachedToken {
            access_token: "t".into(),
            expires_at: Instant::now() + Duration::from_secs(30),
        };
        assert!(!soon.is_valid());
        assert!(soon.is_usable());

        let later = CachedToken {
            access_token: "t".into(),
            expires_at: Instant::now() + Duration::from_secs(600),
        };
        assert!(later.is_valid());
    }

    #[tokio::test]
    async fn test_static_token() {
        assert_eq!(StaticToken("abc".into()).access_token().await.unwrap(), "abc");
    }
}
