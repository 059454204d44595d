//! # pkgup-api: Repository Upload Server
//!
//! HTTP front end for a pacman-style binary package repository. Clients PUT
//! built packages; each one is written to the repository directory and added
//! to the repository database with `repo-add`. Package managers then GET the
//! database and packages back as static files.
//!
//! ## API Surface
//!
//! | Method       | Path       | Handler                          |
//! |--------------|------------|----------------------------------|
//! | `GET`        | `/ping`    | [`routes::ping::ping`]           |
//! | `GET`/`HEAD` | `/{*path}` | [`routes::packages::download`]   |
//! | `PUT`        | `/{*path}` | [`routes::packages::upload`]     |
//! | anything else|            | `404`                            |
//!
//! Artifacts are named by the final segment of the path. The database itself
//! lives in the same directory and is served by the same handler.
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware (matched routes only) → Handler
//! ```
//!
//! Prometheus metrics are served by [`metrics_app`] on a separate listener so
//! that no artifact name is shadowed.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::middleware::from_fn;
use axum::routing::get;
use axum::{Extension, Router};

use crate::middleware::metrics::ApiMetrics;

pub use error::AppError;
pub use state::AppState;

/// Assemble the repository router.
pub fn app(state: AppState) -> Router {
    let metrics = state.metrics.clone();

    Router::new()
        .route("/ping", get(routes::ping::ping).fallback(routes::not_found))
        .route(
            "/{*path}",
            get(routes::packages::download)
                .put(routes::packages::upload)
                .fallback(routes::not_found),
        )
        .route_layer(from_fn(middleware::metrics::metrics_middleware))
        .fallback(routes::not_found)
        .layer(middleware::tracing_layer::layer())
        .layer(Extension(metrics))
        .with_state(state)
}

/// Router for the metrics listener: `GET /metrics` in Prometheus text format.
pub fn metrics_app(metrics: ApiMetrics) -> Router {
    Router::new()
        .route("/metrics", get(middleware::metrics::prometheus_metrics))
        .layer(Extension(metrics))
}
