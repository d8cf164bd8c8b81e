//! Video upload and listing (/videos/*)

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    routing::{get, post},
};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;
use crate::domain::videos::{self, NewVideo, Video};
use crate::services::error::{ApiError, LogErr};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/videos/upload", post(upload_video))
        .route("/videos", get(list_videos))
        .route("/videos/{id}", get(get_video))
}

#[derive(Serialize)]
struct VideoResponse {
    success: bool,
    video: Video,
}

struct UploadForm {
    file: Option<(String, Bytes)>,
    title: Option<String>,
    description: String,
    tags: Vec<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm {
        file: None,
        title: None,
        description: String::new(),
        tags: Vec::new(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .log_as("Multipart field error", ApiError::Validation("malformed multipart body".into()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "video" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let data = field
                    .bytes()
                    .await
                    .log_as("Multipart read error", ApiError::Validation("failed to read video".into()))?;
                form.file = Some((file_name, data));
            }
            "title" | "description" | "tags" => {
                let text = field
                    .text()
                    .await
                    .log_as("Multipart read error", ApiError::Validation(format!("invalid {name}")))?;
                match name.as_str() {
                    "title" => form.title = Some(text.trim().to_string()).filter(|t| !t.is_empty()),
                    "description" => form.description = text,
                    _ => form.tags = videos::parse_tags(&text),
                }
            }
            other => tracing::debug!(field = other, "ignoring unknown multipart field"),
        }
    }

    Ok(form)
}

/// POST /videos/upload - multipart `video` file plus `title`, `description`,
/// and comma separated `tags`
async fn upload_video(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<VideoResponse>, ApiError> {
    let form = read_form(multipart).await?;
    let (file_name, data) = form
        .file
        .filter(|(_, data)| !data.is_empty())
        .ok_or_else(|| ApiError::Validation("No video file uploaded".into()))?;

    let size = data.len();
    let stored = state
        .storage
        .upload(&file_name, data)
        .await
        .map_err(|e| ApiError::upstream("Media upload failed", e))?;

    let title = form.title.unwrap_or_else(|| file_name.clone());
    let video = videos::create_video(
        &state.db,
        NewVideo {
            title: &title,
            description: &form.description,
            media_url: &stored.url,
            media_id: &stored.object_id,
            tags: &form.tags,
        },
    )
    .await
    .log_500("Create video error")?;

    tracing::info!(video_id = video.id, bytes = size, media_id = %video.media_id, "video uploaded");
    Ok(Json(VideoResponse { success: true, video }))
}

/// GET /videos - newest first
async fn list_videos(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Video>>, ApiError> {
    let videos = videos::list_videos(&state.db).await.log_500("List videos error")?;
    Ok(Json(videos))
}

async fn get_video(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Video>, ApiError> {
    videos::get_video(&state.db, id)
        .await
        .log_500("Get video error")?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("video {id} not found")))
}

#[cfg(test)]
mod tests {
    use crate::domain::test_db::TestDb;
    use crate::routes::test_support::*;
    use crate::services::testing::FakeStore;
    use axum::{body::Body, http::Request, http::StatusCode};
    use std::sync::Arc;

    fn multipart_request(parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
        let boundary = "vidcast-boundary";
        let mut body = String::new();
        for (name, file_name, value) in parts {
            body.push_str(&format!("--{boundary}\r\n"));
            match file_name {
                Some(f) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\nContent-Type: video/mp4\r\n\r\n"
                )),
                None => body.push_str(&format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")),
            }
            body.push_str(value);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{boundary}--\r\n"));

        Request::builder()
            .method("POST")
            .uri("/api/videos/upload")
            .header("content-type", format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_upload_without_file_is_rejected() {
        let root = std::env::temp_dir().join(format!("vidcast-videos-{}", std::process::id()));
        let state = state(Arc::new(FakeStore::default()), root);
        let request = multipart_request(&[("title", None, "Launch"), ("tags", None, "a,b")]);

        let response = send(state, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["message"], "No video file uploaded");
    }

    #[tokio::test]
    async fn test_non_numeric_video_id_is_rejected() {
        let state = state(Arc::new(FakeStore::default()), std::env::temp_dir());
        let response = send(state, get("/api/videos/abc")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_stores_file_and_returns_ok() {
        let Some(db) = TestDb::new().await else { return };
        let root = std::env::temp_dir().join(format!("vidcast-videos-db-{}", std::process::id()));
        let state = state_with_db(Arc::new(FakeStore::default()), root.clone(), db.pool.clone());
        let request = multipart_request(&[
            ("video", Some("launch day.mp4"), "mp4-bytes"),
            ("title", None, "Launch"),
            ("tags", None, "a, b,,c"),
        ]);

        let response = send(state.clone(), request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["video"]["title"], "Launch");
        assert_eq!(body["video"]["tags"], serde_json::json!(["a", "b", "c"]));
        let media_id = body["video"]["media_id"].as_str().unwrap();
        assert!(media_id.ends_with("_launch_day.mp4"));
        assert_eq!(tokio::fs::read(root.join(media_id)).await.unwrap(), b"mp4-bytes");

        let id = body["video"]["id"].as_i64().unwrap();
        let response = send(state, get(&format!("/api/videos/{id}"))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let _ = tokio::fs::remove_dir_all(&root).await;
        db.finish().await;
    }
}
