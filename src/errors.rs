use crate::services::diary_service::DiaryError;
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

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for 401 Unauthorized
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    /// Map a diary failure, rendering backend failures with `on_backend`.
    ///
    /// Unauthenticated and invalid-input failures keep their fixed wording;
    /// the backend cause is always logged.
    pub fn from_diary(err: DiaryError, on_backend: impl FnOnce(&DiaryError) -> String) -> Self {
        match err {
            DiaryError::Unauthenticated => {
                Self::unauthorized("Unauthorized: Missing user identity")
            }
            DiaryError::InvalidInput(msg) => Self::bad_request(msg),
            DiaryError::Backend(ref cause) => {
                tracing::error!("Backend failure: {}", cause);
                Self::internal(on_backend(&err))
            }
        }
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

impl From<DiaryError> for AppError {
    fn from(err: DiaryError) -> Self {
        Self::from_diary(err, |err| err.to_string())
    }
}
