//! Video domain - DB queries for uploaded videos
//!
//! All functions use the generic Executor pattern, allowing them to work with
//! both `&PgPool` (for standalone queries) and `&mut PgConnection` (for transactions).

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Executor, Postgres};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Video {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub media_url: String,
    pub media_id: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewVideo<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub media_url: &'a str,
    pub media_id: &'a str,
    pub tags: &'a [String],
}

/// Split a comma separated tag field into trimmed, non-empty tags
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub async fn create_video<'e, E>(executor: E, video: NewVideo<'_>) -> Result<Video, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        INSERT INTO videos (title, description, media_url, media_id, tags)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, title, description, media_url, media_id, tags, created_at
        "#,
    )
    .bind(video.title)
    .bind(video.description)
    .bind(video.media_url)
    .bind(video.media_id)
    .bind(video.tags)
    .fetch_one(executor)
    .await
}

/// All videos, newest first
pub async fn list_videos<'e, E>(executor: E) -> Result<Vec<Video>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT id, title, description, media_url, media_id, tags, created_at
        FROM videos
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .fetch_all(executor)
    .await
}

pub async fn get_video<'e, E>(executor: E, video_id: i64) -> Result<Option<Video>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT id, title, description, media_url, media_id, tags, created_at
        FROM videos WHERE id = $1
        "#,
    )
    .bind(video_id)
    .fetch_optional(executor)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags("travel, food ,,  vlog "), vec!["travel", "food", "vlog"]);
        assert!(parse_tags("").is_empty());
        assert!(parse_tags(" , ").is_empty());
    }
}
