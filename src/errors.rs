use crate::services::{pipeline::TranscodeError, store::StoreError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<TranscodeError> for AppError {
    fn from(err: TranscodeError) -> Self {
        let status = match &err {
            TranscodeError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            TranscodeError::Store {
                source: StoreError::NotFound(_),
                ..
            } => StatusCode::NOT_FOUND,
            TranscodeError::Store {
                source: StoreError::InvalidPath(_),
                ..
            } => StatusCode::BAD_REQUEST,
            TranscodeError::Locked { .. } => StatusCode::CONFLICT,
            TranscodeError::UnsupportedMethod { .. } | TranscodeError::Metadata(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            TranscodeError::IntegrityMismatch { .. } => StatusCode::CONFLICT,
            TranscodeError::Cancelled(_) => StatusCode::SERVICE_UNAVAILABLE,
            TranscodeError::Store { .. } => StatusCode::BAD_GATEWAY,
            TranscodeError::Digest(_) | TranscodeError::Codec(_) | TranscodeError::Join(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        AppError::new(status, err.to_string())
    }
}
