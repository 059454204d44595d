//! # Middleware
//!
//! Tower layers applied to the repository router.

pub mod metrics;
pub mod tracing_layer;
