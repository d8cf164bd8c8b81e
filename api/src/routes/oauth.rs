//! Platform OAuth endpoints (/youtube/*, /tiktok/*)

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};

use super::json_body;
use crate::AppState;
use crate::constants::DEFAULT_USER;
use crate::domain::Platform;
use crate::domain::tokens::{self, TokenStatus};
use crate::services::error::{ApiError, LogErr};
use crate::services::platform::generate_state;

pub fn routes() -> Router<Arc<AppState>> {
    // 5 request burst per client IP, then one every 12 seconds
    let rate_limit_config = GovernorConfigBuilder::default()
        .per_second(12)
        .burst_size(5)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .expect("Failed to build rate limit config");

    let rate_limit_layer = GovernorLayer {
        config: rate_limit_config.into(),
    };

    let mut open = Router::new();
    let mut limited = Router::new();
    for platform in Platform::ALL {
        open = open
            .route(
                &format!("/{platform}/authorize"),
                get(move |state: State<Arc<AppState>>| authorize(state, platform)),
            )
            .route(
                &format!("/{platform}/token-status"),
                get(move |state: State<Arc<AppState>>| token_status(state, platform)),
            );
        limited = limited.route(
            &format!("/{platform}/callback"),
            post(
                move |state: State<Arc<AppState>>,
                      payload: Result<Json<CallbackRequest>, JsonRejection>| {
                    callback(state, payload, platform)
                },
            ),
        );
    }
    // Only the code exchange is limited
    open.merge(limited.layer(rate_limit_layer))
}

#[derive(Serialize)]
struct AuthUrlResponse {
    url: String,
}

/// GET /{platform}/authorize - consent URL carrying a fresh CSRF state
async fn authorize(
    State(state): State<Arc<AppState>>,
    platform: Platform,
) -> Result<Json<AuthUrlResponse>, ApiError> {
    let csrf_state = generate_state();
    tokens::save_oauth_state(&state.db, platform, &csrf_state)
        .await
        .log_500("Save OAuth state error")?;

    Ok(Json(AuthUrlResponse {
        url: state.platforms.get(platform).authorize_url(&csrf_state),
    }))
}

#[derive(Deserialize)]
struct CallbackRequest {
    code: Option<String>,
    state: Option<String>,
}

#[derive(Serialize)]
struct CallbackResponse {
    success: bool,
    message: String,
}

/// POST /{platform}/callback - exchange the authorization code and store the tokens
async fn callback(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CallbackRequest>, JsonRejection>,
    platform: Platform,
) -> Result<Json<CallbackResponse>, ApiError> {
    let req = json_body(payload)?;
    let code = req
        .code
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Authorization code is required".into()))?;

    // State is optional for clients that never called /authorize
    if let Some(csrf_state) = req.state.filter(|s| !s.is_empty()) {
        let known = tokens::take_oauth_state(&state.db, platform, &csrf_state)
            .await
            .log_500("Take OAuth state error")?;
        if !known {
            return Err(ApiError::Validation("Invalid or expired OAuth state".into()));
        }
    }

    let grant = state
        .platforms
        .get(platform)
        .exchange_code(&code)
        .await
        .map_err(|source| {
            tracing::warn!(%platform, error = %source, "code exchange failed");
            ApiError::AuthExchange { platform, source }
        })?;
    let expires_at = grant.expires_at(Utc::now()).map_err(|source| {
        tracing::warn!(%platform, error = %source, "granted token has unusable expiry");
        ApiError::AuthExchange { platform, source }
    })?;

    tokens::upsert_token(
        &state.db,
        platform,
        DEFAULT_USER,
        &grant.access_token,
        grant.refresh_token.as_deref(),
        expires_at,
    )
    .await
    .log_500("Save token error")?;

    tracing::info!(%platform, "platform authenticated");
    Ok(Json(CallbackResponse {
        success: true,
        message: format!("{} authentication successful", platform.display_name()),
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenStatusResponse {
    status: TokenStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

/// GET /{platform}/token-status
async fn token_status(
    State(state): State<Arc<AppState>>,
    platform: Platform,
) -> Result<Json<TokenStatusResponse>, ApiError> {
    let token = tokens::get_token(&state.db, platform, DEFAULT_USER)
        .await
        .log_500("Get token error")?;

    Ok(Json(TokenStatusResponse {
        status: TokenStatus::of(token.as_ref(), Utc::now()),
        expires_at: token.map(|t| t.expires_at),
    }))
}
