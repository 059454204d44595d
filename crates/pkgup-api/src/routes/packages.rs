//! # Package Routes
//!
//! `PUT` stores a package and adds it to the repository database; `GET` and
//! `HEAD` serve any file in the repository directory, the database included.
//!
//! An upload is only acknowledged once the database references it. If
//! anything fails first, including the client going away mid-transfer, the
//! partial or rejected file is removed and the database is untouched. Until
//! then the name answers downloads with `404`.

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::response::Response;
use pkgup_core::NameError;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::error::AppError;
use crate::state::AppState;

/// GET|HEAD /{*path}
///
/// Static file semantics (ranges, conditional requests, `Last-Modified`)
/// come from [`ServeFile`].
pub async fn download(
    State(state): State<AppState>,
    Path(path): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    let (name, _) = state.store.resolve(&path).map_err(|e| match e {
        // `.`/`..` can never name a stored file.
        NameError::Invalid(_) => AppError::ArtifactNotFound,
        too_long => too_long.into(),
    })?;
    let file = state
        .store
        .locate(&name)
        .await?
        .ok_or(AppError::ArtifactNotFound)?;

    match ServeFile::new(file).oneshot(request).await {
        Ok(response) => Ok(response.map(Body::new)),
        Err(never) => match never {},
    }
}

/// PUT /{*path}
pub async fn upload(
    State(state): State<AppState>,
    Path(path): Path<String>,
    body: Body,
) -> Result<&'static str, AppError> {
    let (name, file) = state.store.resolve(&path)?;
    tracing::info!(artifact = %name, path = %file.display(), "receiving package");

    let mut pending = state.store.create(name).await?;
    let size = pending.write_all(body).await?;
    let stored = pending.finalize().await?;
    tracing::debug!(artifact = %stored.name(), size, "package stored");

    match state.sync.incorporate(stored).await {
        Ok(_) => {
            state.metrics.record_index_update("incorporated");
            Ok("ok\n")
        }
        Err(e) => {
            state.metrics.record_index_update("rolled_back");
            Err(e.into())
        }
    }
}
