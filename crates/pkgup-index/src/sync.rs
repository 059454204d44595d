//! # Repository Synchronizer
//!
//! Serializes every mutation of the repository index behind one lock and
//! defines what happens to an artifact when its mutation fails.
//!
//! The lock is a `tokio::sync::Mutex` that owns the tool. Waiting for it is
//! an async suspension, so queued uploads hold no thread. Only the tool run
//! itself goes to the blocking pool, together with the owned guard, and the
//! guard is released when that run ends, even if the tool panics.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pkgup_core::{ArtifactName, StoredArtifact};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::IndexError;
use crate::tool::{IndexTool, Invocation};

/// An artifact that is now referenced by the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incorporated {
    /// Artifact name.
    pub name: ArtifactName,
    /// Artifact size in bytes.
    pub size: u64,
}

type ToolGuard = OwnedMutexGuard<Box<dyn IndexTool>>;

/// Owner of the repository index.
///
/// Cheap to clone; clones share the index lock.
#[derive(Debug, Clone)]
pub struct RepoSynchronizer {
    index_path: Arc<PathBuf>,
    repo_dir: Arc<PathBuf>,
    tool: Arc<Mutex<Box<dyn IndexTool>>>,
}

impl RepoSynchronizer {
    /// Prepare the repository at `index_path`.
    ///
    /// Creates the repository directory (the index's parent) if needed and,
    /// if the index does not exist yet, runs the tool once to create an empty
    /// one. Any failure here should stop the server from starting.
    pub fn open(
        index_path: impl Into<PathBuf>,
        tool: impl IndexTool + 'static,
    ) -> Result<Self, IndexError> {
        let index_path = index_path.into();
        let repo_dir = match index_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&repo_dir).map_err(|source| IndexError::RepoDir {
            path: repo_dir.clone(),
            source,
        })?;

        if index_path.exists() {
            tracing::info!(index = %index_path.display(), "using existing index");
        } else {
            bootstrap(&index_path, &tool)?;
        }

        Ok(Self {
            index_path: Arc::new(index_path),
            repo_dir: Arc::new(repo_dir),
            tool: Arc::new(Mutex::new(Box::new(tool))),
        })
    }

    /// The index database path.
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// The directory holding the index and every artifact.
    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    /// Add a stored artifact to the index.
    ///
    /// On success the artifact is kept on disk. On any failure the artifact
    /// file is removed and the index is left as the tool left it, which for
    /// a failing `repo-add` is unchanged.
    ///
    /// The work runs on a detached task, so dropping the returned future
    /// neither cancels a queued update nor interrupts a tool run that has
    /// already started.
    pub async fn incorporate(&self, artifact: StoredArtifact) -> Result<Incorporated, IndexError> {
        let this = self.clone();
        tokio::spawn(async move {
            let tool = Arc::clone(&this.tool).lock_owned().await;
            tokio::task::spawn_blocking(move || this.run_tool(tool, artifact))
                .await
                .map_err(|e| IndexError::Aborted(e.to_string()))?
        })
        .await
        .map_err(|e| IndexError::Aborted(e.to_string()))?
    }

    fn run_tool(
        &self,
        tool: ToolGuard,
        artifact: StoredArtifact,
    ) -> Result<Incorporated, IndexError> {
        let invocation = Invocation::incorporate(&self.index_path, artifact.path());
        tracing::info!(
            artifact = %artifact.name(),
            index = %self.index_path.display(),
            "running index tool"
        );
        let result = tool.invoke(&invocation);
        drop(tool);

        match result {
            Ok(out) if out.success() => {
                tracing::debug!(artifact = %artifact.name(), output = %out.output, "index tool output");
                let size = artifact.size();
                let name = artifact.keep();
                tracing::info!(artifact = %name, size, "successfully added");
                Ok(Incorporated { name, size })
            }
            Ok(out) => {
                let name = artifact.name().to_string();
                tracing::warn!(
                    artifact = %name,
                    code = ?out.code,
                    output = %out.output,
                    "index tool failed, removing artifact"
                );
                artifact.discard();
                Err(IndexError::UpdateFailed {
                    artifact: name,
                    code: out.code,
                    output: out.output,
                })
            }
            Err(e) => {
                tracing::error!(artifact = %artifact.name(), error = %e, "cannot run index tool");
                artifact.discard();
                Err(IndexError::Spawn(e))
            }
        }
    }
}

/// Create an empty index. Runs before the tool is shared, so no lock is
/// taken.
fn bootstrap(index_path: &Path, tool: &dyn IndexTool) -> Result<(), IndexError> {
    tracing::info!(index = %index_path.display(), "creating empty index");
    let out = tool
        .invoke(&Invocation::bootstrap(index_path))
        .map_err(IndexError::Spawn)?;

    if !out.success() {
        tracing::error!(
            index = %index_path.display(),
            code = ?out.code,
            output = %out.output,
            "index bootstrap failed"
        );
        return Err(IndexError::BootstrapFailed {
            index: index_path.to_path_buf(),
            code: out.code,
            output: out.output,
        });
    }
    Ok(())
}
