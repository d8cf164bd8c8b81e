//! Application constants

/// Token owner used by every HTTP route; the store keeps the user dimension
pub const DEFAULT_USER: &str = "default";

/// Maximum upload size for videos (500 MB)
pub const MAX_VIDEO_UPLOAD_SIZE: usize = 500 * 1024 * 1024;

/// Connection pool limits
pub const DB_MAX_CONNECTIONS: u32 = 20;
pub const DB_ACQUIRE_TIMEOUT_SECS: u64 = 2;
pub const DB_IDLE_TIMEOUT_SECS: u64 = 30;

/// Default GCS bucket for uploaded media
pub const DEFAULT_BUCKET_NAME: &str = "vidcast_media";

/// Object prefix for uploaded videos
pub const VIDEO_PREFIX: &str = "videos";

/// YouTube "Entertainment" category
pub const YOUTUBE_CATEGORY_ID: &str = "24";
pub const YOUTUBE_DEFAULT_PRIVACY: &str = "public";

/// Unaudited TikTok apps may only post privately
pub const TIKTOK_DEFAULT_PRIVACY: &str = "SELF_ONLY";
