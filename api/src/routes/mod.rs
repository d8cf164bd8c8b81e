pub mod health;
pub mod media;
pub mod oauth;
pub mod publication;
pub mod schedules;
pub mod videos;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, rejection::JsonRejection},
    http::{StatusCode, Uri},
    response::IntoResponse,
};
use std::sync::Arc;

use crate::AppState;
use crate::services::error::ApiError;

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(health::routes())
        .merge(videos::routes())
        .merge(schedules::routes())
        .merge(oauth::routes())
        .merge(publication::routes())
}

/// API under `/api`, local media under `/media`, JSON 404 for everything else
pub fn app(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .nest("/api", build_routes())
        .merge(media::routes())
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "Not Found",
            "message": format!("Route {} not found", uri.path()),
            "path": uri.path(),
        })),
    )
}

/// Turn a body rejection into a 400 instead of axum's 422
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::{body::Body, http::Request, response::Response};
    use http_body_util::BodyExt;
    use sqlx::PgPool;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tower::ServiceExt;

    use crate::AppState;
    use crate::domain::Platform;
    use crate::services::platform::Platforms;
    use crate::services::publish::{PublishStore, TokenPolicy};
    use crate::services::testing::{FakeClient, FakeStore};
    use crate::storage::MediaStorage;

    /// App state over fakes. The pool never connects, so only paths that
    /// fail before touching Postgres can be exercised through it.
    pub fn state(store: Arc<FakeStore>, media_root: std::path::PathBuf) -> Arc<AppState> {
        let db = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(100))
            .connect_lazy("postgres://localhost:1/vidcast_test")
            .unwrap();
        state_with_db(store, media_root, db)
    }

    /// App state whose route-level queries run against `db`
    pub fn state_with_db(
        store: Arc<FakeStore>,
        media_root: std::path::PathBuf,
        db: PgPool,
    ) -> Arc<AppState> {
        let store: Arc<dyn PublishStore> = store;
        Arc::new(AppState {
            db,
            store,
            storage: MediaStorage::Local {
                root: media_root,
                public_base_url: "http://localhost:3000".to_string(),
            },
            platforms: Platforms {
                youtube: Arc::new(FakeClient::new(Platform::Youtube)),
                tiktok: Arc::new(FakeClient::new(Platform::Tiktok)),
            },
            policy: TokenPolicy::default(),
            environment: "development".to_string(),
            started_at: Instant::now(),
        })
    }

    pub async fn send(state: Arc<AppState>, request: Request<Body>) -> Response {
        super::app(state, 1024 * 1024).oneshot(request).await.unwrap()
    }

    pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap()
    }

    pub async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }
}
