//! Liveness endpoints (/health, /status)

use axum::{Json, Router, extract::State, routing::get};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    environment: String,
    /// Seconds since startup
    uptime: f64,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: Utc::now().to_rfc3339(),
        environment: state.environment.clone(),
        uptime: state.started_at.elapsed().as_secs_f64(),
    })
}

async fn status() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "Backend is running" }))
}
