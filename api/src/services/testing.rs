//! In-memory store and scripted platform client for workflow tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use super::platform::{PlatformClient, PlatformError, PublishedVideo, TokenGrant, VideoPayload};
use super::publish::PublishStore;
use crate::constants::DEFAULT_USER;
use crate::domain::Platform;
use crate::domain::publications::{PUBLISHED, Publication};
use crate::domain::schedules::{DueSchedule, Schedule, ScheduleStatus};
use crate::domain::tokens::OAuthToken;
use crate::domain::videos::Video;

#[derive(Default)]
struct State {
    tokens: HashMap<(Platform, String), OAuthToken>,
    schedules: HashMap<i64, Schedule>,
    videos: HashMap<i64, Video>,
    publications: Vec<Publication>,
}

#[derive(Default)]
pub struct FakeStore {
    state: Mutex<State>,
}

impl FakeStore {
    pub fn add_video(&self, id: i64, title: &str, media_url: &str) {
        self.state.lock().unwrap().videos.insert(
            id,
            Video {
                id,
                title: title.to_string(),
                description: format!("{title} description"),
                media_url: media_url.to_string(),
                media_id: format!("videos/{id}.mp4"),
                tags: vec!["launch".to_string()],
                created_at: Utc::now(),
            },
        );
    }

    pub fn add_schedule(&self, id: i64, video_id: i64, platform: Platform, at: DateTime<Utc>) {
        self.state.lock().unwrap().schedules.insert(
            id,
            Schedule {
                id,
                video_id,
                platform,
                scheduled_time: at,
                status: ScheduleStatus::Pending,
                created_at: Utc::now(),
            },
        );
    }

    pub fn add_token(
        &self,
        platform: Platform,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: DateTime<Utc>,
    ) {
        self.state.lock().unwrap().tokens.insert(
            (platform, DEFAULT_USER.to_string()),
            OAuthToken {
                platform,
                user_id: DEFAULT_USER.to_string(),
                access_token: access_token.to_string(),
                refresh_token: refresh_token.map(str::to_string),
                expires_at,
            },
        );
    }

    pub fn set_status(&self, id: i64, status: ScheduleStatus) {
        if let Some(s) = self.state.lock().unwrap().schedules.get_mut(&id) {
            s.status = status;
        }
    }

    pub fn schedule_status(&self, id: i64) -> ScheduleStatus {
        self.state.lock().unwrap().schedules[&id].status
    }

    pub fn token(&self, platform: Platform) -> Option<OAuthToken> {
        self.state
            .lock()
            .unwrap()
            .tokens
            .get(&(platform, DEFAULT_USER.to_string()))
            .cloned()
    }

    pub fn publications(&self) -> Vec<Publication> {
        self.state.lock().unwrap().publications.clone()
    }

    fn transition(&self, id: i64, from: ScheduleStatus, to: ScheduleStatus) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.schedules.get_mut(&id) {
            Some(s) if s.status == from => {
                s.status = to;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl PublishStore for FakeStore {
    async fn get_token(
        &self,
        platform: Platform,
        user_id: &str,
    ) -> Result<Option<OAuthToken>, sqlx::Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tokens
            .get(&(platform, user_id.to_string()))
            .cloned())
    }

    async fn save_token(
        &self,
        platform: Platform,
        user_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        self.state.lock().unwrap().tokens.insert(
            (platform, user_id.to_string()),
            OAuthToken {
                platform,
                user_id: user_id.to_string(),
                access_token: access_token.to_string(),
                refresh_token: refresh_token.map(str::to_string),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get_schedule(&self, schedule_id: i64) -> Result<Option<Schedule>, sqlx::Error> {
        Ok(self.state.lock().unwrap().schedules.get(&schedule_id).cloned())
    }

    async fn get_video(&self, video_id: i64) -> Result<Option<Video>, sqlx::Error> {
        Ok(self.state.lock().unwrap().videos.get(&video_id).cloned())
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<DueSchedule>, sqlx::Error> {
        let state = self.state.lock().unwrap();
        let mut due: Vec<DueSchedule> = state
            .schedules
            .values()
            .filter(|s| s.status == ScheduleStatus::Pending && s.scheduled_time <= now)
            .map(|s| DueSchedule {
                id: s.id,
                video_id: s.video_id,
                platform: s.platform,
                scheduled_time: s.scheduled_time,
                status: s.status,
                created_at: s.created_at,
                media_url: state
                    .videos
                    .get(&s.video_id)
                    .map(|v| v.media_url.clone())
                    .unwrap_or_default(),
            })
            .collect();
        due.sort_by_key(|s| (s.scheduled_time, s.id));
        Ok(due)
    }

    async fn claim(&self, schedule_id: i64) -> Result<bool, sqlx::Error> {
        Ok(self.transition(schedule_id, ScheduleStatus::Pending, ScheduleStatus::InProgress))
    }

    async fn release(&self, schedule_id: i64) -> Result<bool, sqlx::Error> {
        Ok(self.transition(schedule_id, ScheduleStatus::InProgress, ScheduleStatus::Pending))
    }

    async fn record_publication(
        &self,
        schedule_id: i64,
        platform: Platform,
        platform_video_id: &str,
        published_at: DateTime<Utc>,
    ) -> Result<Publication, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        if state.publications.iter().any(|p| p.schedule_id == schedule_id) {
            return Err(sqlx::Error::Protocol("duplicate publication".into()));
        }
        let publication = Publication {
            id: state.publications.len() as i64 + 1,
            schedule_id,
            platform,
            platform_video_id: platform_video_id.to_string(),
            status: PUBLISHED.to_string(),
            published_at,
        };
        state.publications.push(publication.clone());
        if let Some(s) = state.schedules.get_mut(&schedule_id) {
            s.status = ScheduleStatus::Published;
        }
        Ok(publication)
    }
}

/// Platform client that records calls. Publishing yields
/// `<platform>-video-<n>` unless a failure is scripted.
pub struct FakeClient {
    platform: Platform,
    failure: Mutex<Option<PlatformError>>,
    refresh_grant: Option<TokenGrant>,
    refresh_calls: Mutex<usize>,
    published: Mutex<Vec<(String, VideoPayload)>>,
}

impl FakeClient {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            failure: Mutex::new(None),
            refresh_grant: None,
            refresh_calls: Mutex::new(0),
            published: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next publish with `err`
    pub fn failing(self, err: PlatformError) -> Self {
        *self.failure.lock().unwrap() = Some(err);
        self
    }

    pub fn with_refresh(mut self, grant: TokenGrant) -> Self {
        self.refresh_grant = Some(grant);
        self
    }

    pub fn refresh_calls(&self) -> usize {
        *self.refresh_calls.lock().unwrap()
    }

    /// (access token, payload) per successful publish
    pub fn published(&self) -> Vec<(String, VideoPayload)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformClient for FakeClient {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn authorize_url(&self, state: &str) -> String {
        format!("https://auth.example.com/{}?state={}", self.platform, state)
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, PlatformError> {
        let expires_in = match code {
            "good-code" => 3600,
            "endless-code" => i64::MAX,
            _ => 0,
        };
        if expires_in > 0 {
            Ok(TokenGrant {
                access_token: format!("{}-access", self.platform),
                refresh_token: Some(format!("{}-refresh", self.platform)),
                expires_in,
            })
        } else {
            Err(PlatformError::Api {
                status: 400,
                body: "invalid_grant".into(),
            })
        }
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, PlatformError> {
        *self.refresh_calls.lock().unwrap() += 1;
        self.refresh_grant
            .clone()
            .ok_or_else(|| PlatformError::Api {
                status: 400,
                body: "invalid_grant".into(),
            })
    }

    async fn publish(
        &self,
        access_token: &str,
        video: &VideoPayload,
    ) -> Result<PublishedVideo, PlatformError> {
        if let Some(err) = self.failure.lock().unwrap().take() {
            return Err(err);
        }
        let mut published = self.published.lock().unwrap();
        published.push((access_token.to_string(), video.clone()));
        Ok(PublishedVideo {
            platform_video_id: format!("{}-video-{}", self.platform, published.len()),
        })
    }
}
