//! # Server Bootstrap
//!
//! 1. **Locate `repo-add`**, resolving it against `PATH`.
//! 2. **Open the repository**: create its directory and, if the database is
//!    missing, an empty database.
//!
//! Either failure aborts startup.

use pkgup_index::{IndexError, RepoAdd, RepoSynchronizer};

use crate::config::Config;
use crate::state::AppState;

/// Prepare the repository described by `config`.
pub fn bootstrap(config: &Config) -> Result<AppState, IndexError> {
    let tool = RepoAdd::locate(&config.repo_add)?;
    tracing::info!(tool = %tool.program().display(), "using index tool");

    let sync = RepoSynchronizer::open(&config.db, tool)?;
    tracing::info!(
        index = %sync.index_path().display(),
        repo = %sync.repo_dir().display(),
        "repository ready"
    );
    Ok(AppState::new(sync))
}
