//! Serves locally stored uploads (/media/*) so platforms can pull them by URL.

use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use std::sync::Arc;

use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/media/{*path}", get(serve_file))
}

fn content_type_for(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

async fn serve_file(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    // Path traversal protection
    if path.split('/').any(|segment| segment == "..")
        || path.contains('\0')
        || path.starts_with('/')
    {
        return Err(StatusCode::FORBIDDEN);
    }

    let root = state.storage.local_root().ok_or(StatusCode::NOT_FOUND)?;
    let canonical = root
        .join(&path)
        .canonicalize()
        .map_err(|_| StatusCode::NOT_FOUND)?;
    let root = root.canonicalize().map_err(|_| StatusCode::NOT_FOUND)?;
    if !canonical.starts_with(&root) {
        return Err(StatusCode::FORBIDDEN);
    }

    let bytes = tokio::fs::read(&canonical).await.map_err(|e| {
        tracing::warn!(path = %path, error = %e, "media read failed");
        StatusCode::NOT_FOUND
    })?;

    Ok(([(header::CONTENT_TYPE, content_type_for(&path))], bytes))
}
