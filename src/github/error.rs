//! GitHub API error types.
//!
//! Every failure aborts the current poll of one repository; the next cycle
//! starts again from the last stored cursor. The kind is kept for logging
//! and so callers can tell a bad response from an unreachable server.

use std::fmt;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The kind of GitHub API error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHubErrorKind {
    /// Connect, timeout, DNS, or body-read failure.
    Transport,

    /// The server answered with an unexpected HTTP status.
    Status,

    /// The response body or headers could not be interpreted.
    Decode,
}

/// A GitHub API error.
#[derive(Debug, Error)]
pub struct GitHubApiError {
    /// What went wrong.
    pub kind: GitHubErrorKind,

    /// The HTTP status code, if a response was received.
    pub status_code: Option<u16>,

    /// A human-readable description of the error.
    pub message: String,

    /// The underlying error, if any.
    #[source]
    pub source: Option<BoxError>,
}

impl fmt::Display for GitHubApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "GitHub API error (HTTP {}): {}", code, self.message),
            None => write!(f, "GitHub API error: {}", self.message),
        }
    }
}

impl GitHubApiError {
    /// Creates a transport error from an octocrab error.
    pub fn transport(message: impl Into<String>, source: octocrab::Error) -> Self {
        Self {
            kind: GitHubErrorKind::Transport,
            status_code: None,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an error for a non-success status. `body` is truncated for the message.
    pub fn status(status_code: u16, body: &str) -> Self {
        const MAX_BODY: usize = 200;
        let excerpt: String = body.chars().take(MAX_BODY).collect();
        Self {
            kind: GitHubErrorKind::Status,
            status_code: Some(status_code),
            message: format!("unexpected response: {}", excerpt),
            source: None,
        }
    }

    /// Creates a decode error.
    pub fn decode(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind: GitHubErrorKind::Decode,
            status_code: None,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
