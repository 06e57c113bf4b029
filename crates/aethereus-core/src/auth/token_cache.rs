use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::Result;
use futures::future::BoxFuture;
use tokio::sync::RwLock;

const TOKEN_REFRESH_THRESHOLD_SECS: u64 = 5 * 60; // 5 minutes

/// A bearer token issued by the identity provider
#[derive(Clone)]
pub struct IssuedToken {
    pub token: String,
    /// `None` for tokens that never expire
    pub expires_at: Option<SystemTime>,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Opaque source of identity tokens (the signed-in user)
pub trait TokenSource: Send + Sync + 'static {
    fn fetch_token(&self) -> BoxFuture<'static, Result<IssuedToken>>;
}

/// A fixed token, e.g. passed on the command line
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl TokenSource for StaticTokenSource {
    fn fetch_token(&self) -> BoxFuture<'static, Result<IssuedToken>> {
        let token = self.token.clone();
        Box::pin(async move {
            Ok(IssuedToken {
                token,
                expires_at: None,
            })
        })
    }
}

/// Cache in front of a `TokenSource`.
///
/// Token refresh triggers:
/// - No cached token exists
/// - Cached token expires in < 5 minutes
/// - Explicit refresh request (e.g., after 401 error)
///
/// Cloning is cheap and clones share the cached token.
#[derive(Clone)]
pub struct TokenCache {
    source: Arc<dyn TokenSource>,
    cached_token: Arc<RwLock<Option<IssuedToken>>>,
}

impl TokenCache {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Convenience constructor for a fixed token
    pub fn from_static(token: impl Into<String>) -> Self {
        Self::new(Arc::new(StaticTokenSource::new(token)))
    }

    /// Get a valid token, refreshing if needed
    pub async fn get_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                match token.expires_at {
                    None => return Ok(token.token.clone()),
                    Some(expires_at) => {
                        if let Ok(ttl) = expires_at.duration_since(SystemTime::now())
                            && ttl > Duration::from_secs(TOKEN_REFRESH_THRESHOLD_SECS)
                        {
                            tracing::debug!(ttl_seconds = ttl.as_secs(), "Using cached identity token");
                            return Ok(token.token.clone());
                        }
                        tracing::info!("Identity token expired or expiring soon, refreshing");
                    }
                }
            }
        }

        self.refresh_token().await
    }

    /// Force token refresh (called on 401 errors or manual refresh)
    pub async fn refresh_token(&self) -> Result<String> {
        let issued = self.source.fetch_token().await?;
        let token = issued.token.clone();

        tracing::debug!(expires_at = ?issued.expires_at, "Identity token refreshed");
        *self.cached_token.write().await = Some(issued);

        Ok(token)
    }

    /// Drop the cached token so the next call fetches a new one
    pub async fn invalidate(&self) {
        *self.cached_token.write().await = None;
    }
}
