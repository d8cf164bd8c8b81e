//! Runtime configuration, read once from the environment at startup
//!
//! ## Environment Variables
//! - `DATABASE_URL` - Postgres connection string (default: `postgres://localhost:5432/vidcast`)
//! - `PORT` - listening port (default: `3000`)
//! - `APP_ENV` - `development` or `production` (default: `development`)
//! - `PUBLIC_BASE_URL` - externally reachable base URL (default: `http://localhost:<PORT>`)
//! - `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`, `GOOGLE_REDIRECT_URI` - YouTube OAuth app
//! - `TIKTOK_CLIENT_ID`, `TIKTOK_CLIENT_SECRET`, `TIKTOK_REDIRECT_URI` - TikTok OAuth app
//! - `LOCAL_STORAGE_PATH` - store uploads on disk instead of GCS (optional)
//! - `GCS_BUCKET_NAME` - GCS bucket when not storing locally (default: `vidcast_media`)
//! - `OAUTH_AUTO_REFRESH` - refresh expired tokens before publishing (default: `false`)
//! - `DISPATCH_INTERVAL_SECS` - run the due-schedule dispatcher on this interval (optional)
//! - `MAX_UPLOAD_BYTES` - multipart body limit (default: 500 MB)
//! - `LOG_FORMAT` - `json` for JSON log lines (default: human readable)

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{DEFAULT_BUCKET_NAME, MAX_VIDEO_UPLOAD_SIZE};
use crate::domain::Platform;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has invalid value `{value}`")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageConfig {
    Gcs { bucket: String },
    Local { root: PathBuf },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub environment: String,
    pub public_base_url: String,
    pub youtube: OAuthCredentials,
    pub tiktok: OAuthCredentials,
    pub storage: StorageConfig,
    pub auto_refresh: bool,
    pub dispatch_interval: Option<Duration>,
    pub max_upload_bytes: usize,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let port = match get("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid { key: "PORT", value: raw })?,
            None => 3000,
        };

        let public_base_url = get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let credentials = |platform: Platform,
                           id_key: &'static str,
                           secret_key: &'static str,
                           redirect_key: &'static str|
         -> Result<OAuthCredentials, ConfigError> {
            Ok(OAuthCredentials {
                client_id: require(id_key)?,
                client_secret: require(secret_key)?,
                redirect_uri: get(redirect_key)
                    .unwrap_or_else(|| format!("{public_base_url}/oauth/{platform}")),
            })
        };

        let youtube = credentials(
            Platform::Youtube,
            "GOOGLE_CLIENT_ID",
            "GOOGLE_CLIENT_SECRET",
            "GOOGLE_REDIRECT_URI",
        )?;
        let tiktok = credentials(
            Platform::Tiktok,
            "TIKTOK_CLIENT_ID",
            "TIKTOK_CLIENT_SECRET",
            "TIKTOK_REDIRECT_URI",
        )?;

        let storage = match get("LOCAL_STORAGE_PATH") {
            Some(root) => StorageConfig::Local { root: PathBuf::from(root) },
            None => StorageConfig::Gcs {
                bucket: get("GCS_BUCKET_NAME").unwrap_or_else(|| DEFAULT_BUCKET_NAME.to_string()),
            },
        };

        let auto_refresh = match get("OAUTH_AUTO_REFRESH") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid {
                key: "OAUTH_AUTO_REFRESH",
                value: raw,
            })?,
            None => false,
        };

        let dispatch_interval = match get("DISPATCH_INTERVAL_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "DISPATCH_INTERVAL_SECS",
                        value: raw,
                    });
                }
            },
            None => None,
        };

        let max_upload_bytes = get("MAX_UPLOAD_BYTES")
            .and_then(|s| s.parse().ok())
            .filter(|v| *v > 0)
            .unwrap_or(MAX_VIDEO_UPLOAD_SIZE);

        Ok(Self {
            database_url: get("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost:5432/vidcast".to_string()),
            port,
            environment: get("APP_ENV").unwrap_or_else(|| "development".to_string()),
            public_base_url,
            youtube,
            tiktok,
            storage,
            auto_refresh,
            dispatch_interval,
            max_upload_bytes,
            log_json: get("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
