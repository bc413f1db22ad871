//! Account and hook configuration.
//!
//! The configuration file is a JSON array of accounts. Each account carries
//! the GitHub user that owns the polled repositories, a personal access token
//! for that user, and the hooks to deliver:
//!
//! ```json
//! [
//!   {
//!     "user": "octocat",
//!     "token": "ghp_...",
//!     "hooks": [
//!       { "repo": "hello-world", "events": ["*"], "url": "https://ci.example/hook", "secret": "s3cret" },
//!       { "repo": "hello-world", "events": ["issues"], "url": "https://bot.example/hook" }
//!     ]
//!   }
//! ]
//! ```
//!
//! Field names are matched case-insensitively for the common spellings
//! (`user`/`User`, `url`/`URL`, ...).
//!
//! Event lists are normalized at load time: any list containing `"*"` becomes
//! [`EventFilter::Wildcard`], and an empty or missing list subscribes to
//! `push` only. The loaded [`Config`] is immutable and shared by reference.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::types::RepoId;

/// Event name that subscribes a hook to every event type.
pub const WILDCARD_EVENT: &str = "*";

/// Event a hook subscribes to when its configuration lists none.
pub const DEFAULT_EVENT: &str = "push";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON of the expected shape.
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),

    /// A field has a value that cannot be used.
    #[error("invalid config for account {user}: {reason}")]
    Invalid { user: String, reason: String },
}

/// Which event types a hook subscribes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    /// Every event type.
    Wildcard,
    /// Only the listed event types.
    Only(BTreeSet<String>),
}

impl EventFilter {
    /// Normalizes a configured event list.
    pub fn from_events<I, S>(events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let events: BTreeSet<String> = events.into_iter().map(Into::into).collect();
        if events.contains(WILDCARD_EVENT) {
            EventFilter::Wildcard
        } else if events.is_empty() {
            EventFilter::Only(BTreeSet::from([DEFAULT_EVENT.to_string()]))
        } else {
            EventFilter::Only(events)
        }
    }

    /// Returns true if an event of this type should be delivered.
    pub fn matches(&self, event_type: &str) -> bool {
        match self {
            EventFilter::Wildcard => true,
            EventFilter::Only(events) => events.contains(event_type),
        }
    }
}

/// One downstream endpoint subscribed to events of one repository.
#[derive(Clone, PartialEq, Eq)]
pub struct HookRule {
    pub repo: String,
    pub events: EventFilter,
    pub url: String,
    /// Signing secret. `None` when absent or configured as an empty string.
    pub secret: Option<String>,
}

impl fmt::Debug for HookRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRule")
            .field("repo", &self.repo)
            .field("events", &self.events)
            .field("url", &self.url)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A GitHub account whose repositories are polled and relayed.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub user: String,
    pub token: String,
    pub hooks: Vec<HookRule>,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("user", &self.user)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

/// The loaded, normalized configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub accounts: Vec<Account>,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    #[serde(alias = "User")]
    user: String,
    #[serde(alias = "Token", default)]
    token: String,
    #[serde(alias = "Hooks", default)]
    hooks: Vec<RawHook>,
}

#[derive(Debug, Deserialize)]
struct RawHook {
    #[serde(alias = "Repo")]
    repo: String,
    #[serde(alias = "Events", default)]
    events: Vec<String>,
    #[serde(alias = "URL", alias = "Url")]
    url: String,
    #[serde(alias = "Secret", default)]
    secret: Option<String>,
}

impl Config {
    /// Reads and normalizes the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parses and normalizes configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: Vec<RawAccount> = serde_json::from_str(json)?;

        let accounts = raw
            .into_iter()
            .map(|account| {
                if account.user.is_empty() {
                    return Err(ConfigError::Invalid {
                        user: account.user,
                        reason: "user must not be empty".to_string(),
                    });
                }
                let hooks = account
                    .hooks
                    .into_iter()
                    .map(|hook| {
                        if hook.repo.is_empty() || hook.repo.contains('/') {
                            return Err(ConfigError::Invalid {
                                user: account.user.clone(),
                                reason: format!("invalid repository name {:?}", hook.repo),
                            });
                        }
                        Ok(HookRule {
                            repo: hook.repo,
                            events: EventFilter::from_events(hook.events),
                            url: hook.url,
                            secret: hook.secret.filter(|s| !s.is_empty()),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Account {
                    user: account.user,
                    token: account.token,
                    hooks,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Config { accounts })
    }

    /// Returns every distinct repository named by any hook, in configuration order.
    pub fn repositories(&self) -> Vec<RepoId> {
        let mut repos: Vec<RepoId> = Vec::new();
        for account in &self.accounts {
            for hook in &account.hooks {
                let repo = RepoId::new(&account.user, &hook.repo);
                if !repos.contains(&repo) {
                    repos.push(repo);
                }
            }
        }
        repos
    }
}
