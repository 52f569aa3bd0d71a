//! HTTP error mapping.
//!
//! Client errors carry a descriptive message. Storage failures are logged in full and reported
//! with a generic body, so internal paths never reach the client.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use imgstore_files::{ErrorKind, FilesError};

/// Body sent for every storage failure.
pub const STORAGE_FAILURE_MESSAGE: &str = "Internal storage error";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    PayloadTooLarge(String),
    Internal,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn from_multipart(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(e.body_text())
        } else {
            Self::BadRequest(format!("Invalid multipart body: {}", e.body_text()))
        }
    }

    pub fn from_multipart_rejection(e: MultipartRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl From<FilesError> for ApiError {
    fn from(e: FilesError) -> Self {
        match e.kind() {
            ErrorKind::InvalidInput => Self::BadRequest(e.to_string()),
            ErrorKind::NotFound => Self::NotFound(e.to_string()),
            ErrorKind::StorageUnavailable => {
                tracing::error!(error = %e, "storage error");
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message).into_response(),
            Self::PayloadTooLarge(message) => {
                (StatusCode::PAYLOAD_TOO_LARGE, message).into_response()
            }
            Self::Internal => {
                (StatusCode::INTERNAL_SERVER_ERROR, STORAGE_FAILURE_MESSAGE).into_response()
            }
        }
    }
}
