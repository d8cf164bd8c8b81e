//! Publication workflow: token resolution, schedule claim, platform publish,
//! and the transactional record of the outcome.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::error::{ApiError, LogErr};
use super::platform::{PlatformClient, VideoPayload};
use crate::constants::DEFAULT_USER;
use crate::domain::publications::{self, Publication};
use crate::domain::schedules::{self, DueSchedule, Schedule, ScheduleStatus};
use crate::domain::tokens::{self, OAuthToken};
use crate::domain::videos::{self, Video};
use crate::domain::Platform;

/// Persistence needed by the workflow
#[async_trait]
pub trait PublishStore: Send + Sync {
    async fn get_token(
        &self,
        platform: Platform,
        user_id: &str,
    ) -> Result<Option<OAuthToken>, sqlx::Error>;

    async fn save_token(
        &self,
        platform: Platform,
        user_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>;

    async fn get_schedule(&self, schedule_id: i64) -> Result<Option<Schedule>, sqlx::Error>;

    async fn get_video(&self, video_id: i64) -> Result<Option<Video>, sqlx::Error>;

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<DueSchedule>, sqlx::Error>;

    /// pending -> in_progress; false if not pending
    async fn claim(&self, schedule_id: i64) -> Result<bool, sqlx::Error>;

    /// in_progress -> pending
    async fn release(&self, schedule_id: i64) -> Result<bool, sqlx::Error>;

    /// Insert the publication and mark the schedule published, atomically
    async fn record_publication(
        &self,
        schedule_id: i64,
        platform: Platform,
        platform_video_id: &str,
        published_at: DateTime<Utc>,
    ) -> Result<Publication, sqlx::Error>;
}

#[derive(Clone)]
pub struct PgPublishStore {
    db: PgPool,
}

impl PgPublishStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PublishStore for PgPublishStore {
    async fn get_token(
        &self,
        platform: Platform,
        user_id: &str,
    ) -> Result<Option<OAuthToken>, sqlx::Error> {
        tokens::get_token(&self.db, platform, user_id).await
    }

    async fn save_token(
        &self,
        platform: Platform,
        user_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        tokens::upsert_token(&self.db, platform, user_id, access_token, refresh_token, expires_at)
            .await
    }

    async fn get_schedule(&self, schedule_id: i64) -> Result<Option<Schedule>, sqlx::Error> {
        schedules::get_schedule(&self.db, schedule_id).await
    }

    async fn get_video(&self, video_id: i64) -> Result<Option<Video>, sqlx::Error> {
        videos::get_video(&self.db, video_id).await
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<DueSchedule>, sqlx::Error> {
        schedules::list_due(&self.db, now).await
    }

    async fn claim(&self, schedule_id: i64) -> Result<bool, sqlx::Error> {
        schedules::claim_schedule(&self.db, schedule_id).await
    }

    async fn release(&self, schedule_id: i64) -> Result<bool, sqlx::Error> {
        schedules::release_schedule(&self.db, schedule_id).await
    }

    async fn record_publication(
        &self,
        schedule_id: i64,
        platform: Platform,
        platform_video_id: &str,
        published_at: DateTime<Utc>,
    ) -> Result<Publication, sqlx::Error> {
        let mut tx = self.db.begin().await?;
        let publication = publications::insert_publication(
            &mut *tx,
            schedule_id,
            platform,
            platform_video_id,
            published_at,
        )
        .await?;
        schedules::update_status(&mut *tx, schedule_id, ScheduleStatus::Published).await?;
        tx.commit().await?;
        Ok(publication)
    }
}

/// Whether an expired token may be refreshed before publishing.
/// Off by default: an expired token fails the publish.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenPolicy {
    pub auto_refresh: bool,
}

/// Request-level replacements for the video's stored metadata
#[derive(Debug, Clone, Default)]
pub struct PublishOverrides {
    pub title: Option<String>,
    pub description: Option<String>,
    pub media_url: Option<String>,
    pub privacy_status: Option<String>,
}

fn build_payload(video: Video, overrides: &PublishOverrides) -> VideoPayload {
    VideoPayload {
        title: overrides.title.clone().unwrap_or(video.title),
        description: overrides.description.clone().unwrap_or(video.description),
        tags: video.tags,
        media_url: overrides.media_url.clone().unwrap_or(video.media_url),
        privacy_status: overrides.privacy_status.clone(),
    }
}

/// Return a usable access token for the client's platform
pub async fn resolve_access_token(
    store: &dyn PublishStore,
    client: &dyn PlatformClient,
    user_id: &str,
    policy: TokenPolicy,
) -> Result<String, ApiError> {
    let platform = client.platform();
    let token = store
        .get_token(platform, user_id)
        .await
        .log_500("Get token error")?
        .ok_or(ApiError::NotAuthenticated(platform))?;

    let now = Utc::now();
    if !token.is_expired(now) {
        return Ok(token.access_token);
    }

    let refresh_token = match token.refresh_token {
        Some(rt) if policy.auto_refresh => rt,
        _ => {
            tracing::warn!(%platform, expired_at = %token.expires_at, "token expired");
            return Err(ApiError::TokenExpired(platform));
        }
    };

    tracing::info!(%platform, "refreshing expired token");
    let grant = client.refresh(&refresh_token).await.map_err(|e| {
        tracing::warn!(%platform, error = %e, "token refresh failed");
        ApiError::TokenExpired(platform)
    })?;
    let expires_at = grant.expires_at(now).map_err(|e| {
        tracing::warn!(%platform, error = %e, "refreshed token has unusable expiry");
        ApiError::TokenExpired(platform)
    })?;

    // Google omits the refresh token on refresh; keep the one we have
    let next_refresh = grant.refresh_token.as_deref().unwrap_or(&refresh_token);
    store
        .save_token(
            platform,
            user_id,
            &grant.access_token,
            Some(next_refresh),
            expires_at,
        )
        .await
        .log_500("Save refreshed token error")?;

    Ok(grant.access_token)
}

/// Publish one schedule through `client`.
///
/// Authentication is checked before anything is mutated. The schedule is then
/// claimed (pending -> in_progress); a failed publish hands it back to
/// pending, a successful one records the publication and marks the schedule
/// published in one transaction.
pub async fn publish_schedule(
    store: &dyn PublishStore,
    client: &dyn PlatformClient,
    schedule_id: i64,
    overrides: &PublishOverrides,
    policy: TokenPolicy,
) -> Result<Publication, ApiError> {
    let platform = client.platform();
    let access_token = resolve_access_token(store, client, DEFAULT_USER, policy).await?;

    let schedule = store
        .get_schedule(schedule_id)
        .await
        .log_500("Get schedule error")?
        .ok_or_else(|| ApiError::NotFound(format!("schedule {schedule_id} not found")))?;
    if schedule.platform != platform {
        return Err(ApiError::Validation(format!(
            "schedule {} targets {}, not {}",
            schedule_id, schedule.platform, platform
        )));
    }

    let video = store
        .get_video(schedule.video_id)
        .await
        .log_500("Get video error")?
        .ok_or_else(|| ApiError::NotFound(format!("video {} not found", schedule.video_id)))?;

    if !store.claim(schedule_id).await.log_500("Claim schedule error")? {
        return Err(ApiError::Conflict(format!(
            "schedule {schedule_id} is not pending"
        )));
    }

    let payload = build_payload(video, overrides);
    let published = match client.publish(&access_token, &payload).await {
        Ok(published) => published,
        Err(source) => {
            tracing::error!(schedule_id, %platform, error = %source, "publish failed");
            if let Err(e) = store.release(schedule_id).await {
                tracing::error!(schedule_id, error = %e, "failed to release schedule claim");
            }
            return Err(ApiError::Publish { platform, source });
        }
    };

    let publication = store
        .record_publication(schedule_id, platform, &published.platform_video_id, Utc::now())
        .await
        .map_err(|e| {
            // The video is live but the schedule stays in_progress
            tracing::error!(
                schedule_id,
                platform_video_id = %published.platform_video_id,
                error = %e,
                "published but failed to record publication"
            );
            ApiError::internal("Record publication error", e)
        })?;

    tracing::info!(
        schedule_id,
        %platform,
        platform_video_id = %publication.platform_video_id,
        "published"
    );
    Ok(publication)
}
