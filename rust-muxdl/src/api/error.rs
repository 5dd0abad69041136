//! API error handling.
//!
//! Each pipeline failure class maps to its own status and code. Messages are
//! short and never carry paths or upstream details; those go to the log.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::Error;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// 400 Bad Request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// 502 Bad Gateway: the extraction provider could not resolve the URL.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", message)
    }

    /// 502 Bad Gateway: a media stream could not be fetched.
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "FETCH_ERROR", message)
    }

    pub fn mux(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "MUX_ERROR", message)
    }

    pub fn streaming(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "STREAMING_ERROR", message)
    }

    /// 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            // Validation messages are written for the client.
            Error::Validation(msg) => ApiError::bad_request(msg),
            Error::Provider(msg) => {
                tracing::warn!("Provider error: {}", msg);
                ApiError::provider("Failed to fetch video formats")
            }
            Error::Fetch(msg) => {
                tracing::error!("Fetch error: {}", msg);
                ApiError::fetch("Failed to download media stream")
            }
            Error::Mux(msg) => {
                tracing::error!("Mux error: {}", msg);
                ApiError::mux("Failed to merge audio and video")
            }
            Error::Streaming(msg) => {
                tracing::error!("Streaming error: {}", msg);
                ApiError::streaming("Failed to stream download")
            }
            Error::Io(e) => {
                tracing::error!("IO error: {}", e);
                ApiError::internal("IO error occurred")
            }
            _ => {
                tracing::error!("Unexpected error: {}", err);
                ApiError::internal("An unexpected error occurred")
            }
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
