//! Synthesized `issues` webhook payloads for detected renames.
//!
//! The body mirrors what GitHub would send for an `issues` event:
//!
//! ```json
//! {"action":"updated","issue":{...},"repository":{...},"sender":{...}}
//! ```
//!
//! `issue` and `sender` are the issue and actor objects from the issue-event
//! record, copied byte for byte. `repository` is fetched when the webhook is
//! built, because counters such as `open_issues_count` move independently of
//! the rename, and is restricted to the fields a webhook's repository object
//! carries.

use std::collections::HashMap;

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use serde_json::value::RawValue;
use tracing::warn;

use crate::github::GitHubApi;
use crate::poller::CandidateEvent;
use crate::types::RepoId;

/// Webhook event type used for synthesized rename deliveries.
pub const ISSUES_EVENT: &str = "issues";

/// `action` value of synthesized rename payloads.
pub const RENAME_ACTION: &str = "updated";

/// Repository fields copied into webhook payloads, in output order.
pub const REPOSITORY_FIELDS: &[&str] = &[
    "id",
    "name",
    "full_name",
    "owner",
    "private",
    "html_url",
    "description",
    "fork",
    "url",
    "forks_url",
    "keys_url",
    "collaborators_url",
    "teams_url",
    "hooks_url",
    "issue_events_url",
    "events_url",
    "assignees_url",
    "branches_url",
    "tags_url",
    "blobs_url",
    "git_tags_url",
    "git_refs_url",
    "trees_url",
    "statuses_url",
    "languages_url",
    "stargazers_url",
    "contributors_url",
    "subscribers_url",
    "subscription_url",
    "commits_url",
    "git_commits_url",
    "comments_url",
    "issue_comment_url",
    "contents_url",
    "compare_url",
    "merges_url",
    "archive_url",
    "downloads_url",
    "issues_url",
    "pulls_url",
    "milestones_url",
    "notifications_url",
    "labels_url",
    "releases_url",
    "created_at",
    "updated_at",
    "pushed_at",
    "git_url",
    "ssh_url",
    "clone_url",
    "svn_url",
    "homepage",
    "size",
    "stargazers_count",
    "watchers_count",
    "language",
    "has_issues",
    "has_downloads",
    "has_wiki",
    "has_pages",
    "forks_count",
    "mirror_url",
    "open_issues_count",
    "forks",
    "open_issues",
    "watchers",
    "default_branch",
];

/// Repository object embedded in a synthesized payload.
#[derive(Debug)]
pub enum RepositoryMetadata {
    /// Allow-listed fields of the live repository, verbatim, in allow-list order.
    Restricted(Vec<(&'static str, Box<RawValue>)>),

    /// The repository could not be fetched; serialized as `{}`.
    Unavailable,
}

impl RepositoryMetadata {
    /// Restricts a `GET /repos/{owner}/{repo}` body to [`REPOSITORY_FIELDS`].
    ///
    /// Fields missing from the body are omitted.
    pub fn from_api_body(body: &str) -> Result<Self, serde_json::Error> {
        let mut fields: HashMap<String, Box<RawValue>> = serde_json::from_str(body)?;
        let restricted = REPOSITORY_FIELDS
            .iter()
            .filter_map(|name| fields.remove(*name).map(|value| (*name, value)))
            .collect();
        Ok(RepositoryMetadata::Restricted(restricted))
    }
}

impl Serialize for RepositoryMetadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RepositoryMetadata::Restricted(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, value) in fields {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
            RepositoryMetadata::Unavailable => serializer.serialize_map(Some(0))?.end(),
        }
    }
}

/// Fetches the live repository object, or [`RepositoryMetadata::Unavailable`] on failure.
pub async fn repository_metadata<A: GitHubApi>(api: &A, repo: &RepoId) -> RepositoryMetadata {
    let body = match api.repository(repo).await {
        Ok(body) => body,
        Err(e) => {
            warn!(repo = %repo, error = %e, "Failed to fetch repository metadata");
            return RepositoryMetadata::Unavailable;
        }
    };

    RepositoryMetadata::from_api_body(&body).unwrap_or_else(|e| {
        warn!(repo = %repo, error = %e, "Malformed repository metadata");
        RepositoryMetadata::Unavailable
    })
}

#[derive(Serialize)]
struct IssuesPayload<'a> {
    action: &'static str,
    issue: &'a Option<Box<RawValue>>,
    repository: &'a RepositoryMetadata,
    sender: &'a Option<Box<RawValue>>,
}

/// Builds the webhook body for a rename event.
pub fn synthesize(
    event: &CandidateEvent,
    repository: &RepositoryMetadata,
) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&IssuesPayload {
        action: RENAME_ACTION,
        issue: &event.issue,
        repository,
        sender: &event.actor,
    })
}
