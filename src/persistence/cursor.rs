//! Per-repository reconciliation cursors.
//!
//! A [`Cursor`] records how far the poller has read a repository's issue
//! events: the `ETag` of the last first-page response (used for conditional
//! requests) and the highest event ID seen.
//!
//! # File Format
//!
//! One file per repository at `<data_dir>/<owner>/<repo>`, holding two
//! newline-terminated lines:
//!
//! ```text
//! W/"6d1c6d0b0e6a1d1c"
//! 27410153102
//! ```
//!
//! The first line is the validator (possibly empty), the second the decimal
//! event ID. Loading never fails: a missing or corrupt file is treated as the
//! zero cursor, which costs one full rescan of the repository's history.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, warn};

use super::fsync::write_atomic;
use crate::types::{EventId, RepoId};

/// Errors that can occur when saving a cursor.
#[derive(Debug, Error)]
pub enum CursorError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Owner or repository name is unsafe to use as a path component.
    #[error("invalid path component: {0:?}")]
    InvalidPathComponent(String),

    /// Validator contains a line break and cannot be stored in the record.
    #[error("validator contains a line break")]
    InvalidValidator,
}

/// Reconciliation checkpoint for one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    /// Opaque `ETag` from the last first-page response. Empty if none.
    pub validator: String,

    /// Highest issue-event ID already processed. Zero if none.
    pub marker: EventId,
}

impl Cursor {
    pub fn new(validator: impl Into<String>, marker: impl Into<EventId>) -> Self {
        Cursor {
            validator: validator.into(),
            marker: marker.into(),
        }
    }

    /// Returns the validator for a conditional request, if there is one.
    pub fn validator(&self) -> Option<&str> {
        (!self.validator.is_empty()).then_some(self.validator.as_str())
    }
}

/// Serializes a cursor to its two-line record.
pub fn format_cursor(cursor: &Cursor) -> String {
    format!("{}\n{}\n", cursor.validator, cursor.marker)
}

/// Parses a two-line cursor record.
///
/// Returns `None` if either line is missing or the marker is not a decimal
/// `u64`.
pub fn parse_cursor(content: &str) -> Option<Cursor> {
    let mut lines = content.lines();
    let validator = lines.next()?.trim();
    let marker = lines.next()?.trim().parse::<u64>().ok()?;
    Some(Cursor::new(validator, marker))
}

/// Rejects names that could escape the data directory.
fn validate_path_component(component: &str) -> Result<(), CursorError> {
    if component.is_empty()
        || component == "."
        || component == ".."
        || component.contains(['/', '\\', '\0'])
    {
        return Err(CursorError::InvalidPathComponent(component.to_string()));
    }
    Ok(())
}

/// Filesystem-backed cursor persistence rooted at a data directory.
#[derive(Debug, Clone)]
pub struct CursorStore {
    data_dir: PathBuf,
}

impl CursorStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        CursorStore {
            data_dir: data_dir.into(),
        }
    }

    /// Returns the path of the cursor file for `repo`.
    pub fn path_for(&self, repo: &RepoId) -> Result<PathBuf, CursorError> {
        validate_path_component(&repo.owner)?;
        validate_path_component(&repo.repo)?;
        Ok(self.data_dir.join(&repo.owner).join(&repo.repo))
    }

    /// Restores the cursor for `repo`, or the zero cursor if none is stored.
    pub fn load(&self, repo: &RepoId) -> Cursor {
        let path = match self.path_for(repo) {
            Ok(path) => path,
            Err(e) => {
                warn!(repo = %repo, error = %e, "Cannot locate cursor file");
                return Cursor::default();
            }
        };

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(repo = %repo, "No stored cursor");
                return Cursor::default();
            }
            Err(e) => {
                warn!(repo = %repo, error = %e, "Failed to read cursor file");
                return Cursor::default();
            }
        };

        match parse_cursor(&content) {
            Some(cursor) => cursor,
            None => {
                warn!(repo = %repo, path = %path.display(), "Corrupt cursor file, starting from scratch");
                Cursor::default()
            }
        }
    }

    /// Persists the cursor for `repo` atomically.
    pub fn save(&self, repo: &RepoId, cursor: &Cursor) -> Result<(), CursorError> {
        if cursor.validator.contains(['\n', '\r']) {
            return Err(CursorError::InvalidValidator);
        }
        let path = self.path_for(repo)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_atomic(&path, format_cursor(cursor).as_bytes())?;
        Ok(())
    }
}
