//! # pkgup-core: Artifact Store
//!
//! The leaf crate of the pkgup workspace. It knows how to turn a request
//! target into a safe on-disk artifact path and how to write one artifact
//! per name without ever overwriting a completed upload. It has no knowledge
//! of the repository index; that lives in `pkgup-index`.
//!
//! ## Upload Lifecycle
//!
//! ```text
//! ArtifactStore::create() ─▶ PendingArtifact ─finalize()─▶ StoredArtifact ─keep()─▶ kept on disk
//!                                  │                              │
//!                                drop                       drop / discard()
//!                                  ▼                              ▼
//!                               removed                        removed
//! ```
//!
//! Every handle between `create()` and `keep()` removes its file when
//! dropped, so error returns, cancelled request futures and panics all roll
//! back the partial upload.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `pkgup-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod name;
pub mod store;

pub use error::{NameError, StoreError};
pub use name::{ArtifactName, MAX_NAME_LEN};
pub use store::{ArtifactStore, PendingArtifact, StoredArtifact};
