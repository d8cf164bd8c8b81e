//! YouTube Data API v3 client: Google OAuth2 and resumable video upload

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::Deserialize;

use super::platform::{
    PlatformClient, PlatformError, PublishedVideo, TokenGrant, VideoPayload, ensure_success,
    percent_encode,
};
use crate::config::OAuthCredentials;
use crate::constants::{YOUTUBE_CATEGORY_ID, YOUTUBE_DEFAULT_PRIVACY};
use crate::domain::Platform;

const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/youtube.upload",
    "https://www.googleapis.com/auth/youtube.readonly",
];

#[derive(Debug, Clone)]
struct Endpoints {
    authorize: String,
    token: String,
    upload: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authorize: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token: "https://oauth2.googleapis.com/token".to_string(),
            upload: "https://www.googleapis.com/upload/youtube/v3/videos".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct YoutubeClient {
    credentials: OAuthCredentials,
    endpoints: Endpoints,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct UploadedVideo {
    id: String,
}

impl YoutubeClient {
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
                upload: format!("{base}/upload"),
            },
            http: Client::new(),
        }
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenGrant, PlatformError> {
        let resp = self.http.post(&self.endpoints.token).form(params).send().await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.json().await?)
    }

    /// Video resource body for `videos.insert`
    fn video_resource(video: &VideoPayload) -> serde_json::Value {
        serde_json::json!({
            "snippet": {
                "title": video.title,
                "description": video.description,
                "tags": video.tags,
                "categoryId": YOUTUBE_CATEGORY_ID,
            },
            "status": {
                "privacyStatus": video.privacy_status.as_deref().unwrap_or(YOUTUBE_DEFAULT_PRIVACY),
            },
        })
    }

    async fn download_media(&self, media_url: &str) -> Result<(bytes::Bytes, String), PlatformError> {
        let resp = ensure_success(self.http.get(media_url).send().await?).await?;
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|ct| ct.starts_with("video/"))
            .unwrap_or("video/*")
            .to_string();
        Ok((resp.bytes().await?, content_type))
    }
}

#[async_trait]
impl PlatformClient for YoutubeClient {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&access_type=offline&prompt=consent&state={}",
            self.endpoints.authorize,
            percent_encode(&self.credentials.client_id),
            percent_encode(&self.credentials.redirect_uri),
            percent_encode(&SCOPES.join(" ")),
            percent_encode(state),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, PlatformError> {
        self.token_request(&[
            ("code", code),
            ("client_id", &self.credentials.client_id),
            ("client_secret", &self.credentials.client_secret),
            ("redirect_uri", &self.credentials.redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, PlatformError> {
        self.token_request(&[
            ("refresh_token", refresh_token),
            ("client_id", &self.credentials.client_id),
            ("client_secret", &self.credentials.client_secret),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    /// Resumable upload: POST the metadata to open a session, then PUT the bytes
    /// to the session URI returned in `Location`.
    async fn publish(
        &self,
        access_token: &str,
        video: &VideoPayload,
    ) -> Result<PublishedVideo, PlatformError> {
        let (data, content_type) = self.download_media(&video.media_url).await?;
        tracing::info!(bytes = data.len(), content_type = %content_type, "uploading video to YouTube");

        let resp = self
            .http
            .post(&self.endpoints.upload)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(access_token)
            .header("X-Upload-Content-Type", &content_type)
            .header("X-Upload-Content-Length", data.len().to_string())
            .json(&Self::video_resource(video))
            .send()
            .await?;
        let resp = ensure_success(resp).await?;

        let session_uri = resp
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| PlatformError::InvalidResponse("missing resumable session Location".into()))?
            .to_string();

        let resp = self
            .http
            .put(&session_uri)
            .bearer_auth(access_token)
            .header(header::CONTENT_TYPE, &content_type)
            .body(data)
            .send()
            .await?;
        let uploaded: UploadedVideo = ensure_success(resp).await?.json().await?;

        Ok(PublishedVideo {
            platform_video_id: uploaded.id,
        })
    }
}
