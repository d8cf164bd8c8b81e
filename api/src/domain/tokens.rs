//! OAuth token domain - one credential set per (platform, user)
//!
//! All functions use the generic Executor pattern, allowing them to work with
//! both `&PgPool` (for standalone queries) and `&mut PgConnection` (for transactions).

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Executor, Postgres};

use super::platform::Platform;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct OAuthToken {
    pub platform: Platform,
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl OAuthToken {
    /// A token is still usable at exactly `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Result of a token-status check, as reported by `/token-status`
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    NotAuthenticated,
    Expired,
    Valid,
}

impl TokenStatus {
    pub fn of(token: Option<&OAuthToken>, now: DateTime<Utc>) -> Self {
        match token {
            None => TokenStatus::NotAuthenticated,
            Some(t) if t.is_expired(now) => TokenStatus::Expired,
            Some(_) => TokenStatus::Valid,
        }
    }
}

/// Insert or overwrite the token for (platform, user_id). The second write wins
/// on every column, including a missing refresh token.
pub async fn upsert_token<'e, E>(
    executor: E,
    platform: Platform,
    user_id: &str,
    access_token: &str,
    refresh_token: Option<&str>,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO oauth_tokens (platform, user_id, access_token, refresh_token, expires_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (platform, user_id) DO UPDATE SET
            access_token = EXCLUDED.access_token,
            refresh_token = EXCLUDED.refresh_token,
            expires_at = EXCLUDED.expires_at,
            updated_at = NOW()
        "#,
    )
    .bind(platform)
    .bind(user_id)
    .bind(access_token)
    .bind(refresh_token)
    .bind(expires_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// Get the stored token. Does not check expiry.
pub async fn get_token<'e, E>(
    executor: E,
    platform: Platform,
    user_id: &str,
) -> Result<Option<OAuthToken>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT platform, user_id, access_token, refresh_token, expires_at
        FROM oauth_tokens
        WHERE platform = $1 AND user_id = $2
        "#,
    )
    .bind(platform)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// Remember a CSRF state issued with an authorization URL
pub async fn save_oauth_state<'e, E>(
    executor: E,
    platform: Platform,
    state: &str,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query("INSERT INTO oauth_states (state, platform) VALUES ($1, $2)")
        .bind(state)
        .bind(platform)
        .execute(executor)
        .await?;
    Ok(())
}

/// Consume a CSRF state. Returns false if it was never issued, already used,
/// expired, or issued for another platform.
pub async fn take_oauth_state<'e, E>(
    executor: E,
    platform: Platform,
    state: &str,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    // DELETE .. RETURNING so two callbacks can't both redeem one state
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        DELETE FROM oauth_states
        WHERE state = $1 AND platform = $2 AND created_at > NOW() - INTERVAL '10 minutes'
        RETURNING state
        "#,
    )
    .bind(state)
    .bind(platform)
    .fetch_optional(executor)
    .await?;

    Ok(row.is_some())
}
