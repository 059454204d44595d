//! # Artifact Names
//!
//! An artifact is named by the final path segment of the request target:
//! `PUT /any/prefix/foo-1.0-1-x86_64.pkg.tar.zst` stores
//! `foo-1.0-1-x86_64.pkg.tar.zst`. Trailing slashes are ignored, matching
//! `basename(1)`.
//!
//! ## Security Invariant
//!
//! Segment extraction alone removes every `/`, but the segment may still be
//! `.` or `..`, or carry a backslash or NUL. Those are rejected so that
//! `repo_dir.join(name)` always names a direct child of the repository
//! directory.

use crate::error::NameError;

/// Maximum artifact name length in bytes.
pub const MAX_NAME_LEN: usize = 80;

/// A validated artifact file name.
///
/// The inner value is a single path component that cannot traverse
/// directories. It cannot be mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactName(String);

impl ArtifactName {
    /// Derive an artifact name from a request path.
    ///
    /// The length check runs first, so an over-long target is always
    /// reported as [`NameError::TooLong`] even if it is otherwise unusable.
    pub fn from_request_path(path: &str) -> Result<Self, NameError> {
        let segment = final_segment(path);
        if segment.len() > MAX_NAME_LEN {
            return Err(NameError::TooLong {
                len: segment.len(),
                max: MAX_NAME_LEN,
            });
        }
        if segment.is_empty()
            || segment == "."
            || segment == ".."
            || segment.contains(&['/', '\\', '\0'][..])
        {
            return Err(NameError::Invalid(segment.to_string()));
        }
        Ok(Self(segment.to_string()))
    }

    /// Return the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn final_segment(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

impl std::fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArtifactName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for ArtifactName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl PartialEq<str> for ArtifactName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}
