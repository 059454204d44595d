//! # pkgup-index: Repository Index Synchronizer
//!
//! The repository index (a `repo-add` database) is the one shared mutable
//! resource of a pkgup server. This crate owns it.
//!
//! ## Mutation Protocol
//!
//! ```text
//! StoredArtifact ─▶ lock ─▶ repo-add --new --remove --prevent-downgrade <db> <pkg> ─▶ unlock
//!                                                                                    │
//!                                                              exit 0 ──▶ keep file  │
//!                                                              else   ──▶ remove file┘
//! ```
//!
//! - One lock per server, never per artifact: `repo-add` is not safe to run
//!   concurrently against the same database.
//! - The lock owns the [`IndexTool`], so the tool cannot be reached without it.
//! - A started invocation always runs to completion, even if the uploading
//!   client disconnects.
//! - Failures are rolled back immediately and never retried.

pub mod error;
pub mod sync;
pub mod tool;

pub use error::IndexError;
pub use sync::{Incorporated, RepoSynchronizer};
pub use tool::{IndexTool, Invocation, RepoAdd, ToolOutput, UpdatePolicy};
