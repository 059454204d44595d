//! # Index Tool
//!
//! The index tool is an external program (`repo-add` from pacman) invoked as
//!
//! ```text
//! <tool> [--new] [--remove] [--prevent-downgrade] <index> [<artifact>]
//! ```
//!
//! Only the exit status drives control flow. Output is captured for logs and
//! never parsed.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::IndexError;

/// Which index policies an invocation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdatePolicy {
    /// `--new`: create the index if it does not exist.
    pub create_if_missing: bool,
    /// `--remove`: drop older versions superseded by this artifact.
    pub remove_superseded: bool,
    /// `--prevent-downgrade`: refuse to replace a newer entry with an older one.
    pub prevent_downgrade: bool,
}

impl UpdatePolicy {
    /// Policy for adding an uploaded artifact.
    pub const INCORPORATE: Self = Self {
        create_if_missing: true,
        remove_superseded: true,
        prevent_downgrade: true,
    };

    /// Policy for creating an empty index at startup.
    pub const BOOTSTRAP: Self = Self {
        create_if_missing: false,
        remove_superseded: false,
        prevent_downgrade: false,
    };

    fn flags(&self) -> impl Iterator<Item = &'static str> {
        [
            (self.create_if_missing, "--new"),
            (self.remove_superseded, "--remove"),
            (self.prevent_downgrade, "--prevent-downgrade"),
        ]
        .into_iter()
        .filter_map(|(on, flag)| on.then_some(flag))
    }
}

/// One request to the index tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// The index database path.
    pub index_path: PathBuf,
    /// The artifact to add, or `None` to only create the index.
    pub artifact_path: Option<PathBuf>,
    /// Requested policies.
    pub policy: UpdatePolicy,
}

impl Invocation {
    /// Add `artifact` to `index`.
    pub fn incorporate(index: &Path, artifact: &Path) -> Self {
        Self {
            index_path: index.to_path_buf(),
            artifact_path: Some(artifact.to_path_buf()),
            policy: UpdatePolicy::INCORPORATE,
        }
    }

    /// Create an empty `index`.
    pub fn bootstrap(index: &Path) -> Self {
        Self {
            index_path: index.to_path_buf(),
            artifact_path: None,
            policy: UpdatePolicy::BOOTSTRAP,
        }
    }

    /// Command-line arguments, in tool order.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.policy.flags().map(OsString::from).collect();
        args.push(self.index_path.clone().into_os_string());
        if let Some(artifact) = &self.artifact_path {
            args.push(artifact.clone().into_os_string());
        }
        args
    }
}

/// Exit code and captured output of one tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, or `None` if the process was killed by a signal.
    pub code: Option<i32>,
    /// stdout followed by stderr, lossily decoded.
    pub output: String,
}

impl ToolOutput {
    /// Whether the tool exited with status 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// An external program that mutates the repository index.
///
/// Implementations are called synchronously from a blocking thread and are
/// never called concurrently by [`crate::RepoSynchronizer`].
pub trait IndexTool: Send + std::fmt::Debug {
    /// Run the tool to completion.
    ///
    /// `Err` means the tool could not be run at all; a tool that ran and
    /// failed is `Ok` with a non-zero [`ToolOutput::code`].
    fn invoke(&self, invocation: &Invocation) -> std::io::Result<ToolOutput>;
}

/// The `repo-add` executable, resolved against `PATH` at startup.
#[derive(Debug, Clone)]
pub struct RepoAdd {
    program: PathBuf,
}

impl RepoAdd {
    /// Locate `program` on `PATH` (or verify it, if it is a path).
    pub fn locate(program: impl AsRef<OsStr>) -> Result<Self, IndexError> {
        let program = program.as_ref();
        let resolved = which::which(program).map_err(|source| IndexError::ToolNotFound {
            program: program.to_string_lossy().into_owned(),
            source,
        })?;
        Ok(Self { program: resolved })
    }

    /// The resolved executable path.
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl IndexTool for RepoAdd {
    fn invoke(&self, invocation: &Invocation) -> std::io::Result<ToolOutput> {
        let output = Command::new(&self.program)
            .args(invocation.args())
            .stdin(Stdio::null())
            .output()?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(ToolOutput {
            code: output.status.code(),
            output: combined,
        })
    }
}
