//! Error handling utilities for route handlers

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::json;
use std::error::Error as StdError;
use std::sync::OnceLock;

use super::platform::PlatformError;
use crate::domain::Platform;

pub type BoxError = Box<dyn StdError + Send + Sync>;

static EXPOSE_DETAIL: OnceLock<bool> = OnceLock::new();

/// Include error source chains in response bodies. Set once at startup,
/// only for development.
pub fn expose_error_detail(enabled: bool) {
    let _ = EXPOSE_DETAIL.set(enabled);
}

fn detail_exposed() -> bool {
    EXPOSE_DETAIL.get().copied().unwrap_or(false)
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{} not authenticated", .0.display_name())]
    NotAuthenticated(Platform),
    #[error("{} token expired", .0.display_name())]
    TokenExpired(Platform),
    #[error("{} authentication failed", .platform.display_name())]
    AuthExchange {
        platform: Platform,
        #[source]
        source: PlatformError,
    },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("publication to {} failed", .platform.display_name())]
    Publish {
        platform: Platform,
        #[source]
        source: PlatformError,
    },
    #[error("{context}")]
    Upstream {
        context: String,
        #[source]
        source: BoxError,
    },
    #[error("{context}")]
    Internal {
        context: String,
        #[source]
        source: BoxError,
    },
}

impl ApiError {
    pub fn internal(context: &str, source: impl Into<BoxError>) -> Self {
        ApiError::Internal {
            context: context.to_string(),
            source: source.into(),
        }
    }

    pub fn upstream(context: &str, source: impl Into<BoxError>) -> Self {
        ApiError::Upstream {
            context: context.to_string(),
            source: source.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotAuthenticated(_) | ApiError::TokenExpired(_) => StatusCode::UNAUTHORIZED,
            ApiError::AuthExchange { source, .. } if source.is_rejection() => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::AuthExchange { .. }
            | ApiError::Publish { .. }
            | ApiError::Upstream { .. }
            | ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The full source chain, outermost first
    fn detail(&self) -> Option<String> {
        let mut chain = Vec::new();
        let mut source = self.source();
        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }
        (!chain.is_empty()).then(|| chain.join(": "))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut error = json!({
            "status": status.as_u16(),
            "message": self.to_string(),
            "timestamp": Utc::now().to_rfc3339(),
        });
        if detail_exposed() {
            if let Some(detail) = self.detail() {
                error["detail"] = json!(detail);
            }
        }

        (status, Json(json!({ "success": false, "error": error }))).into_response()
    }
}

/// Extension trait for logging errors and converting to ApiError
pub trait LogErr<T> {
    /// Log error with context and return ApiError::Internal
    fn log_500(self, context: &str) -> Result<T, ApiError>;

    /// Log error with context and return the given ApiError instead
    fn log_as(self, context: &str, err: ApiError) -> Result<T, ApiError>;
}

impl<T, E> LogErr<T> for Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn log_500(self, context: &str) -> Result<T, ApiError> {
        self.map_err(|e| {
            tracing::error!(error = %e, "{}", context);
            ApiError::internal(context, e)
        })
    }

    fn log_as(self, context: &str, err: ApiError) -> Result<T, ApiError> {
        self.map_err(|e| {
            tracing::warn!(error = %e, "{}", context);
            err
        })
    }
}
