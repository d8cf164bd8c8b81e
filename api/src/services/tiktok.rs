//! TikTok client: Login Kit OAuth2 and Content Posting API (pull from URL)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::platform::{
    PlatformClient, PlatformError, PublishedVideo, TokenGrant, VideoPayload, ensure_success,
    percent_encode,
};
use crate::config::OAuthCredentials;
use crate::constants::TIKTOK_DEFAULT_PRIVACY;
use crate::domain::Platform;

const SCOPES: &[&str] = &["user.info.basic", "video.publish", "video.upload"];

#[derive(Debug, Clone)]
struct Endpoints {
    authorize: String,
    token: String,
    publish_init: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authorize: "https://www.tiktok.com/v2/auth/authorize/".to_string(),
            token: "https://open.tiktokapis.com/v2/oauth/token/".to_string(),
            publish_init: "https://open.tiktokapis.com/v2/post/publish/video/init/".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct TiktokClient {
    credentials: OAuthCredentials,
    endpoints: Endpoints,
    http: Client,
}

/// TikTok reports OAuth failures as `error` fields, sometimes with a 200 status
#[derive(Debug, Deserialize)]
struct TokenBody {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenBody {
    fn into_grant(self) -> Result<TokenGrant, PlatformError> {
        if let Some(error) = self.error.filter(|e| !e.is_empty()) {
            return Err(PlatformError::Api {
                status: 400,
                body: format!("{}: {}", error, self.error_description.unwrap_or_default()),
            });
        }
        match (self.access_token, self.expires_in) {
            (Some(access_token), Some(expires_in)) => Ok(TokenGrant {
                access_token,
                refresh_token: self.refresh_token,
                expires_in,
            }),
            _ => Err(PlatformError::InvalidResponse(
                "token response without access_token".into(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PublishBody {
    data: Option<PublishData>,
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct PublishData {
    publish_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    code: String,
    #[serde(default)]
    message: String,
}

impl TiktokClient {
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            credentials,
            endpoints: Endpoints::default(),
            http: Client::new(),
        }
    }

    #[cfg(test)]
    fn with_base_url(credentials: OAuthCredentials, base: &str) -> Self {
        Self {
            credentials,
            endpoints: Endpoints {
                authorize: format!("{base}/authorize"),
                token: format!("{base}/token"),
                publish_init: format!("{base}/publish"),
            },
            http: Client::new(),
        }
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenGrant, PlatformError> {
        let resp = self.http.post(&self.endpoints.token).form(params).send().await?;
        let body: TokenBody = ensure_success(resp).await?.json().await?;
        body.into_grant()
    }

    fn publish_request(video: &VideoPayload) -> serde_json::Value {
        let caption = if video.description.trim().is_empty() {
            &video.title
        } else {
            &video.description
        };
        serde_json::json!({
            "post_info": {
                "title": caption,
                "privacy_level": video.privacy_status.as_deref().unwrap_or(TIKTOK_DEFAULT_PRIVACY),
            },
            "source_info": {
                "source": "PULL_FROM_URL",
                "video_url": video.media_url,
            },
        })
    }
}

#[async_trait]
impl PlatformClient for TiktokClient {
    fn platform(&self) -> Platform {
        Platform::Tiktok
    }

    fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_key={}&response_type=code&scope={}&redirect_uri={}&state={}",
            self.endpoints.authorize,
            percent_encode(&self.credentials.client_id),
            percent_encode(&SCOPES.join(",")),
            percent_encode(&self.credentials.redirect_uri),
            percent_encode(state),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, PlatformError> {
        self.token_request(&[
            ("client_key", &self.credentials.client_id),
            ("client_secret", &self.credentials.client_secret),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", &self.credentials.redirect_uri),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, PlatformError> {
        self.token_request(&[
            ("client_key", &self.credentials.client_id),
            ("client_secret", &self.credentials.client_secret),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    /// TikTok pulls the media itself from `media_url`; the returned publish id
    /// identifies the post.
    async fn publish(
        &self,
        access_token: &str,
        video: &VideoPayload,
    ) -> Result<PublishedVideo, PlatformError> {
        let resp = self
            .http
            .post(&self.endpoints.publish_init)
            .bearer_auth(access_token)
            .json(&Self::publish_request(video))
            .send()
            .await?;
        let body: PublishBody = ensure_success(resp).await?.json().await?;

        if let Some(status) = body.error.filter(|s| s.code != "ok") {
            return Err(PlatformError::Api {
                status: 400,
                body: format!("{}: {}", status.code, status.message),
            });
        }

        let data = body
            .data
            .ok_or_else(|| PlatformError::InvalidResponse("publish response without data".into()))?;

        Ok(PublishedVideo {
            platform_video_id: data.publish_id,
        })
    }
}
