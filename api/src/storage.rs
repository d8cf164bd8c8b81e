//! Uploaded media storage: a GCS bucket, or a local directory served under `/media`.

use bytes::Bytes;
use google_cloud_storage::client::Storage;
use std::path::{Path, PathBuf};

use crate::constants::VIDEO_PREFIX;
use crate::services::error::BoxError;

#[derive(Clone)]
pub enum MediaStorage {
    Gcs { client: Storage, bucket: String },
    Local { root: PathBuf, public_base_url: String },
}

/// Where an upload ended up
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMedia {
    /// Object path, relative to the bucket or storage root
    pub object_id: String,
    /// Publicly fetchable URL
    pub url: String,
}

impl MediaStorage {
    /// Store `data` under a fresh `videos/<unix-millis>_<name>` path.
    pub async fn upload(&self, file_name: &str, data: Bytes) -> Result<StoredMedia, BoxError> {
        let object_id = object_path(chrono::Utc::now().timestamp_millis(), file_name);

        match self {
            MediaStorage::Gcs { client, bucket } => {
                client
                    .write_object(format!("projects/_/buckets/{bucket}"), &object_id, data)
                    .send_buffered()
                    .await?;
                tracing::info!(bucket = %bucket, object = %object_id, "uploaded to GCS");
                Ok(StoredMedia {
                    url: format!("https://storage.googleapis.com/{bucket}/{object_id}"),
                    object_id,
                })
            }
            MediaStorage::Local { root, public_base_url } => {
                let full_path = root.join(&object_id);
                if let Some(parent) = full_path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&full_path, &data).await?;
                tracing::info!(path = ?full_path, "stored upload locally");
                Ok(StoredMedia {
                    url: format!("{public_base_url}/media/{object_id}"),
                    object_id,
                })
            }
        }
    }

    /// Local storage root, when files are served by this process
    pub fn local_root(&self) -> Option<&Path> {
        match self {
            MediaStorage::Local { root, .. } => Some(root),
            MediaStorage::Gcs { .. } => None,
        }
    }
}

fn object_path(millis: i64, file_name: &str) -> String {
    format!("{}/{}_{}", VIDEO_PREFIX, millis, sanitize_file_name(file_name))
}

/// Keep the base name, replace anything outside `[A-Za-z0-9._-]` with `_`
/// and collapse runs of `.` so no `..` segment survives.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut cleaned = String::with_capacity(base.len());
    for c in base.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            c
        } else {
            '_'
        };
        if c == '.' && cleaned.ends_with('.') {
            continue;
        }
        cleaned.push(c);
    }
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("launch day.mp4"), "launch_day.mp4");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\clips\\intro.mov"), "intro.mov");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "upload");
        assert_eq!(sanitize_file_name("vidéo.mp4"), "vid_o.mp4");
        assert_eq!(sanitize_file_name("clip..final.mp4"), "clip.final.mp4");
        assert_eq!(sanitize_file_name("a...b"), "a.b");
    }

    #[test]
    fn test_object_path() {
        assert_eq!(object_path(1733500000000, "a b.mp4"), "videos/1733500000000_a_b.mp4");
    }

    #[tokio::test]
    async fn test_local_upload_writes_file_and_builds_url() {
        let root = std::env::temp_dir().join(format!("vidcast-storage-{}", std::process::id()));
        let storage = MediaStorage::Local {
            root: root.clone(),
            public_base_url: "http://localhost:3000".to_string(),
        };

        let stored = storage
            .upload("clip.mp4", Bytes::from_static(b"mp4"))
            .await
            .unwrap();

        assert!(stored.object_id.starts_with("videos/"));
        assert!(stored.object_id.ends_with("_clip.mp4"));
        assert_eq!(stored.url, format!("http://localhost:3000/media/{}", stored.object_id));
        assert_eq!(tokio::fs::read(root.join(&stored.object_id)).await.unwrap(), b"mp4");

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
