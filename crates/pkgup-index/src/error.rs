//! # Index Errors

use std::path::PathBuf;

use thiserror::Error;

/// Failure to locate, bootstrap or run the index tool.
#[derive(Error, Debug)]
pub enum IndexError {
    /// The index tool is not on `PATH`.
    #[error("index tool {program:?} not found: {source}")]
    ToolNotFound {
        /// The program name or path that was looked up.
        program: String,
        /// Underlying lookup error.
        #[source]
        source: which::Error,
    },

    /// The repository directory could not be created.
    #[error("cannot create repository directory {path}: {source}")]
    RepoDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The index tool could not be started.
    #[error("cannot run index tool: {0}")]
    Spawn(#[source] std::io::Error),

    /// Creating the empty index at startup failed.
    #[error("cannot create empty index {index}: tool {}", describe(.code))]
    BootstrapFailed {
        /// Index path.
        index: PathBuf,
        /// Tool exit code, if it exited normally.
        code: Option<i32>,
        /// Captured tool output.
        output: String,
    },

    /// The tool rejected the artifact; the index is unchanged.
    #[error("index update for {artifact} failed: tool {}", describe(.code))]
    UpdateFailed {
        /// Artifact name.
        artifact: String,
        /// Tool exit code, if it exited normally.
        code: Option<i32>,
        /// Captured tool output.
        output: String,
    },

    /// The blocking index task did not complete (it panicked).
    #[error("index update aborted: {0}")]
    Aborted(String),
}

fn describe(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {code}"),
        None => "was terminated by a signal".to_string(),
    }
}
