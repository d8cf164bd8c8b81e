//! Publication domain - append-only record of successful publishes
//!
//! All functions use the generic Executor pattern, allowing them to work with
//! both `&PgPool` (for standalone queries) and `&mut PgConnection` (for transactions).

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Executor, Postgres};

use super::platform::Platform;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Publication {
    pub id: i64,
    pub schedule_id: i64,
    pub platform: Platform,
    pub platform_video_id: String,
    pub status: String,
    pub published_at: DateTime<Utc>,
}

pub const PUBLISHED: &str = "published";

/// Record a publication. Keyed by schedule id; a schedule publishes at most once.
pub async fn insert_publication<'e, E>(
    executor: E,
    schedule_id: i64,
    platform: Platform,
    platform_video_id: &str,
    published_at: DateTime<Utc>,
) -> Result<Publication, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        INSERT INTO publications (schedule_id, platform, platform_video_id, status, published_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, schedule_id, platform, platform_video_id, status, published_at
        "#,
    )
    .bind(schedule_id)
    .bind(platform)
    .bind(platform_video_id)
    .bind(PUBLISHED)
    .bind(published_at)
    .fetch_one(executor)
    .await
}
