use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::shared::types::ErrorResponse;

const MAX_ERROR_MESSAGE_LEN: usize = 200;

static PRODUCTION_MODE: AtomicBool = AtomicBool::new(false);

/// Switch error responses to production behaviour (generic 5xx messages)
pub fn set_production_mode(enabled: bool) {
    PRODUCTION_MODE.store(enabled, Ordering::Relaxed);
}

fn is_production_mode() -> bool {
    PRODUCTION_MODE.load(Ordering::Relaxed)
}

lazy_static! {
    static ref SENSITIVE_WORDS: Regex =
        Regex::new(r"(?i)password|token|key|secret|credential").unwrap();
    static ref WINDOWS_PATH: Regex = Regex::new(r"[C-Z]:\\\S*").unwrap();
    static ref UNIX_PATH: Regex = Regex::new(r"/\S*/\S*").unwrap();
    static ref IPV4: Regex = Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b").unwrap();
    static ref UUID: Regex =
        Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap();
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Upstream error (HTTP {status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthorized(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "PERMISSION_ERROR",
            AppError::Conflict(_) => "CONFLICT",
            AppError::RateLimitExceeded(_) => "RATE_LIMITED",
            AppError::Upstream { .. } => "UPSTREAM_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn message(&self) -> &str {
        match self {
            AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::Conflict(msg)
            | AppError::RateLimitExceeded(msg)
            | AppError::Internal(msg) => msg,
            AppError::Upstream { message, .. } => message,
        }
    }

    /// Message safe to return to the client
    pub fn public_message(&self, production: bool) -> String {
        if production && self.status_code().is_server_error() {
            return "Internal server error".to_string();
        }
        sanitize_error_message(self.message())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", self);
        } else {
            tracing::debug!(code = self.code(), "{}", self);
        }

        let body = Json(ErrorResponse::new(
            self.public_message(is_production_mode()),
            self.code(),
        ));

        (status, body).into_response()
    }
}

/// Redact secrets, paths, IPs and UUIDs from a message and cap its length
pub fn sanitize_error_message(message: &str) -> String {
    if message.trim().is_empty() {
        return "Unknown error".to_string();
    }

    let sanitized = SENSITIVE_WORDS.replace_all(message, "[REDACTED]");
    let sanitized = WINDOWS_PATH.replace_all(&sanitized, "[PATH]");
    let sanitized = UNIX_PATH.replace_all(&sanitized, "[PATH]");
    let sanitized = IPV4.replace_all(&sanitized, "[IP]");
    let sanitized = UUID.replace_all(&sanitized, "[UUID]").into_owned();

    if sanitized.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = sanitized.chars().take(MAX_ERROR_MESSAGE_LEN - 3).collect();
        format!("{}...", truncated)
    } else {
        sanitized
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
