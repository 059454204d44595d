//! # Route Modules
//!
//! - `packages`: artifact upload (PUT) and download (GET/HEAD).
//! - `ping`: liveness.

pub mod packages;
pub mod ping;

use crate::error::AppError;

/// Any route or method that is not served.
pub async fn not_found() -> AppError {
    AppError::NotFound
}
