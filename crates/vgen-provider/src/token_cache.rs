//! Access token caching for provider authentication.
//!
//! Provides a thread-safe, async-aware token cache with:
//! - Refresh margin to avoid token expiry during long poll loops
//! - Single-flight pattern to prevent thundering herd on refresh
//! - Graceful fallback to existing valid token on refresh failure

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};

// =============================================================================
// Constants
// =============================================================================

/// Refresh margin: refresh token 60 seconds before expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Conservative token TTL when expiry is unknown (50 minutes).
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for Vertex AI.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

// =============================================================================
// Capability
// =============================================================================

/// Source of bearer tokens. Callers ask again before every network call.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> ProviderResult<String>;

    /// Drop any cached token after the server rejected it.
    async fn invalidate(&self) {}
}

/// Fixed token, for local development (`VERTEX_ACCESS_TOKEN`) and tests.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> ProviderResult<String> {
        Ok(self.token.clone())
    }
}

// =============================================================================
// Token Cache
// =============================================================================

/// Cached token with expiration tracking.
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    /// Check if token is still valid with refresh margin.
    fn is_valid(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    /// Check if token is technically still usable (even if refresh is needed).
    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Thread-safe token cache with single-flight refresh.
pub struct TokenCache {
    auth: Arc<dyn TokenProvider>,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    /// Create a new token cache.
    pub fn new(auth: Arc<dyn TokenProvider>) -> Self {
        Self {
            auth,
            cache: RwLock::new(None),
        }
    }

    /// Get a valid access token, refreshing if necessary.
    ///
    /// - Fast path: return cached token if still valid
    /// - Slow path: acquire write lock and refresh (double-check first)
    /// - Fallback: on refresh failure, use existing token if still usable
    pub async fn get_token(&self) -> ProviderResult<String> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;

        // Another task may have refreshed while we waited
        if let Some(cached) = cache.as_ref() {
            if cached.is_valid() {
                return Ok(cached.access_token.clone());
            }
        }

        self.refresh_token(&mut cache).await
    }

    /// Refresh the token, updating the cache.
    async fn refresh_token(&self, cache: &mut Option<CachedToken>) -> ProviderResult<String> {
        match self.auth.token(&[CLOUD_PLATFORM_SCOPE]).await {
            Ok(token) => {
                let access_token = token.as_str().to_string();

                let expires_at = {
                    let now = Utc::now();
                    let exp = token.expires_at();

                    if exp > now {
                        match (exp - now).to_std() {
                            Ok(ttl) => Instant::now() + ttl,
                            Err(_) => Instant::now() + TOKEN_DEFAULT_TTL,
                        }
                    } else {
                        // Already expired: force a refresh on the next request.
                        Instant::now()
                    }
                };

                *cache = Some(CachedToken {
                    access_token: access_token.clone(),
                    expires_at,
                });

                debug!("Refreshed provider auth token");
                Ok(access_token)
            }
            Err(e) => {
                if let Some(cached) = cache.as_ref() {
                    if cached.is_usable() {
                        warn!("Token refresh failed, using existing token: {}", e);
                        return Ok(cached.access_token.clone());
                    }
                }

                Err(ProviderError::auth_error(format!(
                    "Failed to obtain auth token: {}",
                    e
                )))
            }
        }
    }
}

#[async_trait]
impl AccessTokenProvider for TokenCache {
    async fn access_token(&self) -> ProviderResult<String> {
        self.get_token().await
    }

    async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        if cache.take().is_some() {
            debug!("Invalidated cached provider auth token");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
