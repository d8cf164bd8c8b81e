//! Publish a scheduled video now (/publication/{platform})

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::json_body;
use crate::AppState;
use crate::domain::Platform;
use crate::services::error::ApiError;
use crate::services::publish::{PublishOverrides, publish_schedule};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/publication/{platform}", post(publish))
}

#[derive(Deserialize)]
struct PublishRequest {
    schedule_id: Option<i64>,
    video_url: Option<String>,
    title: Option<String>,
    description: Option<String>,
    privacy_status: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    success: bool,
    video_id: String,
}

async fn publish(
    State(state): State<Arc<AppState>>,
    Path(platform): Path<String>,
    payload: Result<Json<PublishRequest>, JsonRejection>,
) -> Result<Json<PublishResponse>, ApiError> {
    let platform: Platform = platform
        .parse()
        .map_err(|_| ApiError::NotFound(format!("unknown platform `{platform}`")))?;
    let req = json_body(payload)?;
    let schedule_id = req
        .schedule_id
        .ok_or_else(|| ApiError::Validation("Missing required field: schedule_id".into()))?;

    let overrides = PublishOverrides {
        title: req.title,
        description: req.description,
        media_url: req.video_url,
        privacy_status: req.privacy_status,
    };

    let publication = publish_schedule(
        state.store.as_ref(),
        state.platforms.get(platform),
        schedule_id,
        &overrides,
        state.policy,
    )
    .await?;

    Ok(Json(PublishResponse {
        success: true,
        video_id: publication.platform_video_id,
    }))
}
