//! The GitHub operations the poller depends on.
//!
//! The reconciler and payload synthesizer are written against [`GitHubApi`]
//! rather than a concrete client, so tests can drive them with scripted
//! responses. [`super::OctocrabClient`] is the production implementation.

use std::future::Future;

use super::error::GitHubApiError;
use crate::types::RepoId;

/// One fetched page of `GET /repos/{owner}/{repo}/issues/events`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueEventsResponse {
    /// Raw JSON body: an array of issue-event records, newest first.
    pub body: String,

    /// Value of the `ETag` response header.
    pub etag: Option<String>,

    /// Value of the `Link` response header.
    pub link: Option<String>,
}

/// Outcome of an issue-events page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventsPage {
    /// The server answered 304: nothing changed since the supplied validator.
    NotModified,

    /// The server returned a page of events.
    Fetched(IssueEventsResponse),
}

/// GitHub REST operations needed to detect and describe issue renames.
///
/// Implementations are bound to one account's credentials.
pub trait GitHubApi: Send + Sync {
    /// Fetches one page of a repository's issue events.
    ///
    /// When `validator` is given it is sent as `If-None-Match`.
    fn issue_events_page(
        &self,
        repo: &RepoId,
        page: u32,
        validator: Option<&str>,
    ) -> impl Future<Output = Result<EventsPage, GitHubApiError>> + Send;

    /// Fetches the raw JSON body of `GET /repos/{owner}/{repo}`.
    fn repository(
        &self,
        repo: &RepoId,
    ) -> impl Future<Output = Result<String, GitHubApiError>> + Send;
}
