//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Every failure is a status code plus a one-line `text/plain` body; the
//! package tooling that talks to this server only looks at the status.
//! Internal details (io errors, `repo-add` output) are logged, never sent.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pkgup_core::{NameError, StoreError};
use pkgup_index::IndexError;
use thiserror::Error;

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Artifact name longer than the maximum (400).
    #[error("package name too long: {0}")]
    NameTooLong(String),

    /// Artifact name that cannot be stored (400).
    #[error("invalid package name: {0}")]
    InvalidName(String),

    /// No artifact of that name (404, empty body).
    #[error("artifact not found")]
    ArtifactNotFound,

    /// No such route or method (404).
    #[error("not found")]
    NotFound,

    /// An artifact of that name already exists (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and response body for this error.
    fn status_and_body(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NameTooLong(_) => (StatusCode::BAD_REQUEST, "package name too long\n"),
            Self::InvalidName(_) => (StatusCode::BAD_REQUEST, "invalid package name\n"),
            Self::ArtifactNotFound => (StatusCode::NOT_FOUND, ""),
            Self::NotFound => (StatusCode::NOT_FOUND, "Not Found\n"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "package already exists\n"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error\n"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Conflict(_) => tracing::warn!(error = %self, "package already exists"),
            Self::NameTooLong(_) | Self::InvalidName(_) => {
                tracing::info!(error = %self, "rejected package name")
            }
            _ => {}
        }

        (status, body).into_response()
    }
}

impl From<NameError> for AppError {
    fn from(err: NameError) -> Self {
        match err {
            NameError::TooLong { .. } => Self::NameTooLong(err.to_string()),
            NameError::Invalid(name) => Self::InvalidName(name),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Name(name) => name.into(),
            StoreError::AlreadyExists(name) => Self::Conflict(name),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<IndexError> for AppError {
    fn from(err: IndexError) -> Self {
        Self::Internal(err.to_string())
    }
}
