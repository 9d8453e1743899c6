//! OAuth access tokens for Google APIs.
//!
//! `GoogleTokenManager` caches the current access token in memory and
//! refreshes it through the refresh-token grant once it is about to expire.

use async_trait::async_trait;
use datalab_files_core::FileManagerError;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Supplies bearer tokens to Google API clients.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, FileManagerError>;
}

/// A fixed token, e.g. one minted by `gcloud auth print-access-token`.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, FileManagerError> {
        Ok(self.0.clone())
    }
}

/// Cached token with expiration.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: chrono::DateTime<chrono::Utc>,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        chrono::Utc::now() >= self.expires_at - chrono::Duration::minutes(5)
    }
}

/// Refreshing token source backed by an OAuth client and refresh token.
pub struct GoogleTokenManager {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    cache: Mutex<Option<CachedToken>>,
}

impl GoogleTokenManager {
    pub fn new(client_id: String, client_secret: String, refresh_token: String) -> Self {
        Self::with_token_url(GOOGLE_TOKEN_URL.to_string(), client_id, client_secret, refresh_token)
    }

    pub fn with_token_url(
        token_url: String,
        client_id: String,
        client_secret: String,
        refresh_token: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_url,
            client_id,
            client_secret,
            refresh_token,
            cache: Mutex::new(None),
        }
    }

    /// Exchange the refresh token for a new access token.
    async fn refresh(&self) -> Result<CachedToken, FileManagerError> {
        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| FileManagerError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(FileManagerError::Auth(format!(
                "OAuth token refresh failed: {} {}",
                status, body
            )));
        }

        #[derive(serde::Deserialize)]
        struct RefreshResponse {
            access_token: String,
            expires_in: u64,
        }

        let token_resp: RefreshResponse = resp
            .json()
            .await
            .map_err(|e| FileManagerError::Auth(format!("Invalid token response: {}", e)))?;

        let expires_at =
            chrono::Utc::now() + chrono::Duration::seconds(token_resp.expires_in as i64);

        info!("Refreshed Google OAuth token, expires at {}", expires_at.to_rfc3339());

        Ok(CachedToken {
            access_token: token_resp.access_token,
            expires_at,
        })
    }
}

#[async_trait]
impl TokenSource for GoogleTokenManager {
    async fn access_token(&self) -> Result<String, FileManagerError> {
        // Held across the refresh so concurrent callers share a single exchange.
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if !cached.is_expired() {
                debug!("Token cache hit");
                return Ok(cached.access_token.clone());
            }
            debug!("Token expired, refreshing");
        }

        let fresh = self.refresh().await?;
        let token = fresh.access_token.clone();
        *cache = Some(fresh);
        Ok(token)
    }
}
