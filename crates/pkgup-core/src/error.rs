//! # Error Types
//!
//! Errors raised while resolving artifact names and persisting artifact
//! bodies. All use `thiserror`; the API layer maps them to HTTP statuses.

use std::path::PathBuf;

use thiserror::Error;

/// A request target that cannot name an artifact.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The final path segment is longer than the permitted maximum.
    #[error("package name too long: {len} bytes (max {max})")]
    TooLong {
        /// Length of the rejected name in bytes.
        len: usize,
        /// The configured maximum.
        max: usize,
    },

    /// The final path segment would escape or alias the managed directory.
    #[error("invalid package name: {0:?}")]
    Invalid(String),
}

/// Failure while creating, writing or removing an artifact file.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The artifact name could not be resolved.
    #[error(transparent)]
    Name(#[from] NameError),

    /// An artifact with this name is already on disk.
    #[error("package already exists: {0}")]
    AlreadyExists(String),

    /// The destination could not be opened for exclusive writing.
    #[error("cannot create {path}: {source}")]
    Create {
        /// Destination path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The request body could not be copied into the artifact file.
    #[error("transfer of {name} failed: {source}")]
    Transfer {
        /// Artifact name.
        name: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The artifact file could not be flushed and closed.
    #[error("finalizing {name} failed: {source}")]
    Finalize {
        /// Artifact name.
        name: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Any other filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
