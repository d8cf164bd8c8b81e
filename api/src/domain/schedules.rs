//! Schedule domain - publication requests and their status lifecycle
//!
//! All functions use the generic Executor pattern, allowing them to work with
//! both `&PgPool` (for standalone queries) and `&mut PgConnection` (for transactions).

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
use sqlx::{Decode, Encode, Executor, Postgres, Type};
use std::str::FromStr;

use super::platform::Platform;

/// Schedule status. `InProgress` marks a schedule claimed by a running publish.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    InProgress,
    Published,
    Failed,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::InProgress => "in_progress",
            ScheduleStatus::Published => "published",
            ScheduleStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown schedule status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for ScheduleStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScheduleStatus::Pending),
            "in_progress" => Ok(ScheduleStatus::InProgress),
            "published" => Ok(ScheduleStatus::Published),
            "failed" => Ok(ScheduleStatus::Failed),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

impl Type<Postgres> for ScheduleStatus {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for ScheduleStatus {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <String as Decode<Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

impl Encode<'_, Postgres> for ScheduleStatus {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <String as Encode<Postgres>>::encode_by_ref(&self.as_str().to_owned(), buf)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Schedule {
    pub id: i64,
    pub video_id: i64,
    pub platform: Platform,
    pub scheduled_time: DateTime<Utc>,
    pub status: ScheduleStatus,
    pub created_at: DateTime<Utc>,
}

/// A due schedule joined with the media URL of its video
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DueSchedule {
    pub id: i64,
    pub video_id: i64,
    pub platform: Platform,
    pub scheduled_time: DateTime<Utc>,
    pub status: ScheduleStatus,
    pub created_at: DateTime<Utc>,
    pub media_url: String,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ScheduleTimeError {
    #[error("unknown timezone `{0}`")]
    UnknownTimezone(String),
    #[error("invalid scheduled_time `{0}`")]
    InvalidTime(String),
}

const WALL_CLOCK_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

fn parse_wall_clock(raw: &str) -> Option<NaiveDateTime> {
    WALL_CLOCK_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Convert a scheduled time to the UTC instant that gets stored.
///
/// An explicit offset in `raw` wins over `timezone`. Otherwise `raw` is a
/// wall-clock time in the IANA zone `timezone`. Ambiguous local times (clocks
/// falling back) take the earlier instant; local times inside a DST gap are
/// shifted forward by an hour.
pub fn resolve_scheduled_time(raw: &str, timezone: &str) -> Result<DateTime<Utc>, ScheduleTimeError> {
    let raw = raw.trim();

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Ok(with_offset.with_timezone(&Utc));
    }

    let tz: Tz = timezone
        .trim()
        .parse()
        .map_err(|_| ScheduleTimeError::UnknownTimezone(timezone.to_string()))?;

    let naive = parse_wall_clock(raw).ok_or_else(|| ScheduleTimeError::InvalidTime(raw.to_string()))?;

    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| ScheduleTimeError::InvalidTime(raw.to_string()))
}

pub async fn create_schedule<'e, E>(
    executor: E,
    video_id: i64,
    platform: Platform,
    scheduled_time: DateTime<Utc>,
) -> Result<Schedule, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        INSERT INTO schedules (video_id, platform, scheduled_time, status)
        VALUES ($1, $2, $3, 'pending')
        RETURNING id, video_id, platform, scheduled_time, status, created_at
        "#,
    )
    .bind(video_id)
    .bind(platform)
    .bind(scheduled_time)
    .fetch_one(executor)
    .await
}

pub async fn get_schedule<'e, E>(executor: E, schedule_id: i64) -> Result<Option<Schedule>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT id, video_id, platform, scheduled_time, status, created_at
        FROM schedules WHERE id = $1
        "#,
    )
    .bind(schedule_id)
    .fetch_optional(executor)
    .await
}

/// Pending schedules due at `now`, earliest first. Callers that execute them
/// rely on this ordering.
pub async fn list_due<'e, E>(executor: E, now: DateTime<Utc>) -> Result<Vec<DueSchedule>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT s.id, s.video_id, s.platform, s.scheduled_time, s.status, s.created_at,
               v.media_url
        FROM schedules s
        JOIN videos v ON s.video_id = v.id
        WHERE s.status = 'pending' AND s.scheduled_time <= $1
        ORDER BY s.scheduled_time ASC, s.id ASC
        "#,
    )
    .bind(now)
    .fetch_all(executor)
    .await
}

/// Unconditional status overwrite. Returns None if the schedule doesn't exist.
pub async fn update_status<'e, E>(
    executor: E,
    schedule_id: i64,
    status: ScheduleStatus,
) -> Result<Option<Schedule>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        UPDATE schedules SET status = $1
        WHERE id = $2
        RETURNING id, video_id, platform, scheduled_time, status, created_at
        "#,
    )
    .bind(status)
    .bind(schedule_id)
    .fetch_optional(executor)
    .await
}

/// Atomically move a schedule from pending to in_progress.
/// Returns false if it doesn't exist or another caller already holds it.
pub async fn claim_schedule<'e, E>(executor: E, schedule_id: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE schedules SET status = 'in_progress'
        WHERE id = $1 AND status = 'pending'
        "#,
    )
    .bind(schedule_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Hand a claimed schedule back to the pending pool
pub async fn release_schedule<'e, E>(executor: E, schedule_id: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE schedules SET status = 'pending'
        WHERE id = $1 AND status = 'in_progress'
        "#,
    )
    .bind(schedule_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}
