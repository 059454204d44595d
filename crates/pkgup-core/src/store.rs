//! # Artifact Store
//!
//! Filesystem persistence for uploaded artifacts. Artifacts live directly in
//! the repository directory as `{dir}/{name}`.
//!
//! ## Exclusivity Invariant
//!
//! Destinations are opened with `create_new(true)`: the open fails with
//! `AlreadyExists` if the file is present, so two concurrent uploads of one
//! name cannot both succeed and a completed artifact is never overwritten.
//! There is no `exists()`-then-`open()` window.
//!
//! ## Rollback Invariant
//!
//! [`PendingArtifact`] and [`StoredArtifact`] own a removal guard. Unless
//! [`StoredArtifact::keep`] is called, dropping either one removes the file.
//! Removal is best-effort: a failure is logged and the orphaned file is left
//! behind, which is safe because the index never references it.
//!
//! ## Visibility
//!
//! A name is reserved from `create()` until the artifact is kept or removed.
//! [`ArtifactStore::locate`] does not report reserved names, so a download
//! never sees a partial upload or one that is about to be rolled back.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use http_body::Body;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;

use crate::error::{NameError, StoreError};
use crate::name::ArtifactName;

/// Permission bits for newly created artifact files.
#[cfg(unix)]
const ARTIFACT_MODE: u32 = 0o644;

/// Names with an upload in progress.
type Reservations = Arc<Mutex<HashSet<ArtifactName>>>;

/// A directory of artifact files, one per name.
///
/// Clones share the set of in-progress uploads.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    uploading: Reservations,
}

impl ArtifactStore {
    /// Create a store rooted at `dir`. The directory is not touched.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            uploading: Reservations::default(),
        }
    }

    /// Return the managed directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve a request path to an artifact name and its full path.
    pub fn resolve(&self, request_path: &str) -> Result<(ArtifactName, PathBuf), NameError> {
        let name = ArtifactName::from_request_path(request_path)?;
        let path = self.path_of(&name);
        Ok((name, path))
    }

    /// Return the on-disk path for `name`.
    pub fn path_of(&self, name: &ArtifactName) -> PathBuf {
        self.dir.join(name.as_str())
    }

    /// Return the path of `name` if it is a regular file in the store and
    /// not still being uploaded.
    pub async fn locate(&self, name: &ArtifactName) -> Result<Option<PathBuf>, StoreError> {
        if self.is_uploading(name) {
            return Ok(None);
        }
        let path = self.path_of(name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(path)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Exclusively create the file for `name`.
    ///
    /// Returns [`StoreError::AlreadyExists`] if any file of that name is
    /// present, including one still being uploaded by another request.
    pub async fn create(&self, name: ArtifactName) -> Result<PendingArtifact, StoreError> {
        if !self.uploading.lock().insert(name.clone()) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        let path = self.path_of(&name);
        let guard = UploadGuard {
            name,
            path,
            armed: false,
            uploading: Arc::clone(&self.uploading),
        };

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(ARTIFACT_MODE);

        // The guard is disarmed until the file is ours, so a failed open
        // only releases the reservation.
        let opened = options.open(&guard.path).await;
        match opened {
            Ok(file) => Ok(PendingArtifact {
                file,
                written: 0,
                guard: guard.armed(),
            }),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::AlreadyExists(guard.name.to_string()))
            }
            Err(source) => Err(StoreError::Create {
                path: guard.path.clone(),
                source,
            }),
        }
    }

    fn is_uploading(&self, name: &ArtifactName) -> bool {
        self.uploading.lock().contains(name)
    }
}

/// Remove a file that was created but must not be kept.
///
/// Never fails: an error is logged and the file is left in place.
pub fn discard(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "discarded artifact"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove artifact");
        }
    }
}

/// Holds the reservation for one upload. On drop, removes the file if
/// armed, then releases the name.
#[derive(Debug)]
struct UploadGuard {
    name: ArtifactName,
    path: PathBuf,
    armed: bool,
    uploading: Reservations,
}

impl UploadGuard {
    fn armed(mut self) -> Self {
        self.armed = true;
        self
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        if self.armed {
            // Drop cannot await. A single unlink is cheap enough to run on
            // the calling thread.
            discard(&self.path);
        }
        self.uploading.lock().remove(&self.name);
    }
}

/// An artifact whose body is still being received.
///
/// Field order matters: the file handle is closed before the guard runs.
#[derive(Debug)]
pub struct PendingArtifact {
    file: tokio::fs::File,
    written: u64,
    guard: UploadGuard,
}

impl PendingArtifact {
    /// The artifact name.
    pub fn name(&self) -> &ArtifactName {
        &self.guard.name
    }

    /// The artifact file path.
    pub fn path(&self) -> &Path {
        &self.guard.path
    }

    /// Copy an entire request body into the artifact file.
    ///
    /// Trailer frames are ignored. Returns the total number of bytes written
    /// so far. A body error (for example a client disconnect) is reported as
    /// [`StoreError::Transfer`].
    pub async fn write_all<B>(&mut self, body: B) -> Result<u64, StoreError>
    where
        B: Body<Data = Bytes>,
        B::Error: std::fmt::Display,
    {
        let mut body = std::pin::pin!(body);
        while let Some(frame) = body.frame().await {
            let frame = frame
                .map_err(|e| self.transfer_error(std::io::Error::other(e.to_string())))?;
            if let Ok(data) = frame.into_data() {
                self.file
                    .write_all(&data)
                    .await
                    .map_err(|e| self.transfer_error(e))?;
                self.written += data.len() as u64;
            }
        }
        Ok(self.written)
    }

    /// Flush, sync and close the file.
    pub async fn finalize(self) -> Result<StoredArtifact, StoreError> {
        let Self {
            mut file,
            written,
            guard,
        } = self;

        let closed = async {
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        drop(file);

        match closed {
            Ok(()) => Ok(StoredArtifact {
                guard,
                size: written,
            }),
            Err(source) => Err(StoreError::Finalize {
                name: guard.name.to_string(),
                source,
            }),
        }
    }

    fn transfer_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Transfer {
            name: self.guard.name.to_string(),
            source,
        }
    }
}

/// A fully written artifact that is not yet part of the repository.
#[derive(Debug)]
pub struct StoredArtifact {
    guard: UploadGuard,
    size: u64,
}

impl StoredArtifact {
    /// The artifact name.
    pub fn name(&self) -> &ArtifactName {
        &self.guard.name
    }

    /// The artifact file path.
    pub fn path(&self) -> &Path {
        &self.guard.path
    }

    /// Size of the artifact in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Keep the file permanently and make it visible to
    /// [`ArtifactStore::locate`].
    pub fn keep(mut self) -> ArtifactName {
        self.guard.armed = false;
        self.guard.name.clone()
    }

    /// Remove the file now.
    pub fn discard(self) {
        drop(self);
    }
}
