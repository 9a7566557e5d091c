use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

pub type ApiResult<T> = Result<T, AppError>;

// ─── HTTP-facing errors ──────────────────────────────────────────

/// Failure raised by a route body. Rendered as `{"detail": "..."}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error("{0}")]
    Internal(String),

    #[error("failed to encode payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Status { status, .. } => *status,
            Self::Internal(_) | Self::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, error = %self, "handler failed");
        }

        let body = serde_json::json!({ "detail": self.to_string() });
        (status, Json(body)).into_response()
    }
}

// ─── Cache store errors ──────────────────────────────────────────

/// Failure talking to the external key-value store. Never reaches clients.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("store operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

// ─── Startup errors ──────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}
