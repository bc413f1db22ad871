//! Newtype wrappers for domain identifiers.
//!
//! These types keep repository names, delivery IDs and issue-event IDs from
//! being mixed up with plain strings and integers.

use serde::Deserialize;
use std::fmt;

/// A repository identifier (owner/repo format).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        RepoId {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Parses a `full_name` such as `"octocat/hello-world"`.
    ///
    /// Returns `None` unless the name has exactly two non-empty segments.
    pub fn from_full_name(full_name: &str) -> Option<Self> {
        let (owner, repo) = full_name.split_once('/')?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return None;
        }
        Some(RepoId::new(owner, repo))
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// A webhook delivery ID, sent in the `X-GitHub-Delivery` header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryId(pub String);

impl DeliveryId {
    pub fn new(s: impl Into<String>) -> Self {
        DeliveryId(s.into())
    }

    /// Generates a fresh random delivery ID for a webhook we originate.
    pub fn generate() -> Self {
        DeliveryId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DeliveryId {
    fn from(s: String) -> Self {
        DeliveryId(s)
    }
}

/// The numeric ID GitHub assigns to an issue event.
///
/// IDs are strictly increasing in creation order, which makes them usable as
/// a high-water mark. Zero means "nothing seen yet".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl EventId {
    pub const ZERO: EventId = EventId(0);

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EventId {
    fn from(n: u64) -> Self {
        EventId(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod repo_id {
        use super::*;
        use proptest::prelude::*;

        #[test]
        fn from_full_name_splits_owner_and_repo() {
            let repo = RepoId::from_full_name("octocat/hello-world").unwrap();
            assert_eq!(repo, RepoId::new("octocat", "hello-world"));
            assert_eq!(repo.to_string(), "octocat/hello-world");
        }

        #[test]
        fn from_full_name_rejects_malformed() {
            assert_eq!(RepoId::from_full_name("octocat"), None);
            assert_eq!(RepoId::from_full_name("/hello-world"), None);
            assert_eq!(RepoId::from_full_name("octocat/"), None);
            assert_eq!(RepoId::from_full_name("a/b/c"), None);
            assert_eq!(RepoId::from_full_name(""), None);
        }

        proptest! {
            #[test]
            fn display_parses_back(owner in "[a-zA-Z0-9-]{1,20}", repo in "[a-zA-Z0-9._-]{1,30}") {
                let id = RepoId::new(&owner, &repo);
                prop_assert_eq!(RepoId::from_full_name(&id.to_string()), Some(id));
            }
        }
    }

    mod delivery_id {
        use super::*;

        #[test]
        fn generated_ids_are_unique_uuids() {
            let a = DeliveryId::generate();
            let b = DeliveryId::generate();
            assert_ne!(a, b);
            assert!(uuid::Uuid::parse_str(a.as_str()).is_ok());
        }
    }

    mod event_id {
        use super::*;
        use proptest::prelude::*;

        #[test]
        fn zero_is_default() {
            assert_eq!(EventId::default(), EventId::ZERO);
            assert!(EventId::ZERO.is_zero());
            assert!(!EventId(1).is_zero());
        }

        proptest! {
            #[test]
            fn ordering_matches_underlying(a: u64, b: u64) {
                prop_assert_eq!(EventId(a).cmp(&EventId(b)), a.cmp(&b));
            }

            #[test]
            fn deserializes_from_json_number(n: u64) {
                let parsed: EventId = serde_json::from_str(&n.to_string()).unwrap();
                prop_assert_eq!(parsed, EventId(n));
            }
        }
    }
}
