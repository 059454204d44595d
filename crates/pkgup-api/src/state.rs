//! # Application State
//!
//! Shared state handed to every handler. All fields are cheap to clone.

use pkgup_core::ArtifactStore;
use pkgup_index::RepoSynchronizer;

use crate::middleware::metrics::ApiMetrics;

/// State shared by the repository routes.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Artifact files in the repository directory.
    pub store: ArtifactStore,
    /// Serialized access to the repository index.
    pub sync: RepoSynchronizer,
    /// Prometheus metrics.
    pub metrics: ApiMetrics,
}

impl AppState {
    /// Build state around an opened repository.
    ///
    /// The store serves the directory that holds the index, so the index is
    /// downloadable under its own file name.
    pub fn new(sync: RepoSynchronizer) -> Self {
        Self {
            store: ArtifactStore::new(sync.repo_dir()),
            sync,
            metrics: ApiMetrics::new(),
        }
    }
}
