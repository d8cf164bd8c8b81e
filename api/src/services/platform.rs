//! Common interface over the YouTube and TikTok clients

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;

use crate::domain::Platform;

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("unexpected upstream response: {0}")]
    InvalidResponse(String),
}

impl PlatformError {
    /// The platform answered and refused (4xx), as opposed to a transport or
    /// server-side failure.
    pub fn is_rejection(&self) -> bool {
        matches!(self, PlatformError::Api { status, .. } if (400..500).contains(status))
    }
}

/// Tokens returned by an authorization-code or refresh-token exchange
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

impl TokenGrant {
    /// Absolute expiry. A negative or unrepresentable `expires_in` is an
    /// invalid response.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, PlatformError> {
        if self.expires_in < 0 {
            return Err(PlatformError::InvalidResponse(format!(
                "negative expires_in {}",
                self.expires_in
            )));
        }
        Duration::try_seconds(self.expires_in)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                PlatformError::InvalidResponse(format!("expires_in {} out of range", self.expires_in))
            })
    }
}

/// What gets pushed to a platform
#[derive(Debug, Clone, PartialEq)]
pub struct VideoPayload {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub media_url: String,
    pub privacy_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedVideo {
    pub platform_video_id: String,
}

#[async_trait]
pub trait PlatformClient: Send + Sync {
    fn platform(&self) -> Platform;

    /// Consent URL the operator follows to grant access
    fn authorize_url(&self, state: &str) -> String;

    /// Exchange an authorization code for tokens
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, PlatformError>;

    /// Exchange a refresh token for a fresh access token
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, PlatformError>;

    /// Upload and publish a video. Single attempt, no retry.
    async fn publish(
        &self,
        access_token: &str,
        video: &VideoPayload,
    ) -> Result<PublishedVideo, PlatformError>;
}

/// The configured client for each platform
#[derive(Clone)]
pub struct Platforms {
    pub youtube: Arc<dyn PlatformClient>,
    pub tiktok: Arc<dyn PlatformClient>,
}

impl Platforms {
    pub fn get(&self, platform: Platform) -> &dyn PlatformClient {
        match platform {
            Platform::Youtube => self.youtube.as_ref(),
            Platform::Tiktok => self.tiktok.as_ref(),
        }
    }
}

/// Turn a non-2xx response into PlatformError::Api, keeping the body for logs
pub(crate) async fn ensure_success(
    resp: reqwest::Response,
) -> Result<reqwest::Response, PlatformError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await?;
    Err(PlatformError::Api {
        status: status.as_u16(),
        body,
    })
}

/// Random state for CSRF protection on the OAuth redirect
pub fn generate_state() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn percent_encode(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s, percent_encoding::NON_ALPHANUMERIC).to_string()
}
