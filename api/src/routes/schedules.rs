//! Schedule endpoints (/schedules/*)

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, patch, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::json_body;
use crate::AppState;
use crate::domain::Platform;
use crate::domain::schedules::{self, DueSchedule, Schedule, ScheduleStatus};
use crate::domain::videos;
use crate::services::dispatcher::{self, DispatchReport};
use crate::services::error::{ApiError, LogErr};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/schedules", post(create_schedule))
        .route("/schedules/pending", get(pending_schedules))
        .route("/schedules/dispatch", post(dispatch))
        .route("/schedules/{id}/status", patch(update_status))
}

#[derive(Deserialize)]
struct CreateScheduleRequest {
    video_id: Option<i64>,
    platform: Option<String>,
    scheduled_time: Option<String>,
    timezone: Option<String>,
}

#[derive(Serialize)]
struct ScheduleResponse {
    success: bool,
    schedule: Schedule,
}

/// POST /schedules - `scheduled_time` is wall-clock time in `timezone`
/// (IANA, default UTC) unless it carries its own offset
async fn create_schedule(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateScheduleRequest>, JsonRejection>,
) -> Result<Json<ScheduleResponse>, ApiError> {
    let req = json_body(payload)?;

    let (Some(video_id), Some(platform), Some(scheduled_time)) =
        (req.video_id, req.platform, req.scheduled_time)
    else {
        return Err(ApiError::Validation(
            "Missing required fields: video_id, platform, scheduled_time".into(),
        ));
    };

    let platform: Platform = platform
        .parse()
        .map_err(|e: crate::domain::platform::UnknownPlatform| ApiError::Validation(e.to_string()))?;
    let timezone = req.timezone.as_deref().unwrap_or("UTC");
    let scheduled_at = schedules::resolve_scheduled_time(&scheduled_time, timezone)
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    videos::get_video(&state.db, video_id)
        .await
        .log_500("Get video error")?
        .ok_or_else(|| ApiError::NotFound(format!("video {video_id} not found")))?;

    let schedule = schedules::create_schedule(&state.db, video_id, platform, scheduled_at)
        .await
        .log_500("Create schedule error")?;

    tracing::info!(
        schedule_id = schedule.id,
        video_id,
        %platform,
        scheduled_time = %schedule.scheduled_time,
        "schedule created"
    );
    Ok(Json(ScheduleResponse {
        success: true,
        schedule,
    }))
}

/// GET /schedules/pending - due schedules, earliest first
async fn pending_schedules(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DueSchedule>>, ApiError> {
    let due = state
        .store
        .list_due(Utc::now())
        .await
        .log_500("List due schedules error")?;
    Ok(Json(due))
}

#[derive(Deserialize)]
struct StatusRequest {
    status: Option<String>,
}

/// PATCH /schedules/{id}/status - unconditional overwrite. Moving a
/// published schedule back to pending makes it due again.
async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<ScheduleResponse>, ApiError> {
    let req = json_body(payload)?;
    let status: ScheduleStatus = req
        .status
        .ok_or_else(|| ApiError::Validation("Missing required field: status".into()))?
        .parse()
        .map_err(|e: schedules::UnknownStatus| ApiError::Validation(e.to_string()))?;

    let schedule = schedules::update_status(&state.db, id, status)
        .await
        .log_500("Update schedule status error")?
        .ok_or_else(|| ApiError::NotFound(format!("schedule {id} not found")))?;

    Ok(Json(ScheduleResponse {
        success: true,
        schedule,
    }))
}

#[derive(Serialize)]
struct DispatchResponse {
    success: bool,
    #[serde(flatten)]
    report: DispatchReport,
}

/// POST /schedules/dispatch - publish everything that is due now
async fn dispatch(State(state): State<Arc<AppState>>) -> Result<Json<DispatchResponse>, ApiError> {
    let report = dispatcher::dispatch_due(state.store.as_ref(), &state.platforms, state.policy).await?;
    Ok(Json(DispatchResponse {
        success: true,
        report,
    }))
}
