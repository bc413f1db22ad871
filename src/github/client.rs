//! Octocrab client bound to one account's credentials.
//!
//! Every repository of an account is polled through the same client, so the
//! token is attached once at construction. Requests go through octocrab's raw
//! `_get` interface because the poller needs the response status and headers
//! (`ETag`, `Link`, 304 Not Modified) that the typed API hides.

use http::header::{ETAG, HeaderMap, HeaderValue, IF_NONE_MATCH, LINK};
use http::StatusCode;
use octocrab::Octocrab;
use tracing::trace;

use super::api::{EventsPage, GitHubApi, IssueEventsResponse};
use super::error::GitHubApiError;
use crate::types::RepoId;

/// Public GitHub REST endpoint.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// A GitHub API client authenticated as one account.
#[derive(Clone)]
pub struct OctocrabClient {
    client: Octocrab,
}

impl OctocrabClient {
    /// Wraps a pre-configured Octocrab instance.
    pub fn new(client: Octocrab) -> Self {
        Self { client }
    }

    /// Creates a client authenticated with a personal access token.
    ///
    /// `base_uri` is normally [`GITHUB_API_URL`]; GitHub Enterprise and tests
    /// point it elsewhere.
    pub fn from_token(token: impl Into<String>, base_uri: &str) -> Result<Self, octocrab::Error> {
        let client = Octocrab::builder()
            .base_uri(base_uri)?
            .personal_token(token.into())
            .build()?;
        Ok(Self::new(client))
    }

    async fn get_raw(
        &self,
        route: String,
        headers: Option<HeaderMap>,
    ) -> Result<(StatusCode, HeaderMap, String), GitHubApiError> {
        trace!(route = %route, "GET");
        let response = self
            .client
            ._get_with_headers(route.as_str(), headers)
            .await
            .map_err(|e| GitHubApiError::transport(format!("GET {} failed", route), e))?;

        let status = response.status();
        let headers = response.headers().clone();
        if status == StatusCode::NOT_MODIFIED {
            // Nothing to read; dropping the response releases the connection.
            return Ok((status, headers, String::new()));
        }

        let body = self
            .client
            .body_to_string(response)
            .await
            .map_err(|e| GitHubApiError::transport(format!("reading {} failed", route), e))?;
        Ok((status, headers, body))
    }
}

impl std::fmt::Debug for OctocrabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctocrabClient").finish_non_exhaustive()
    }
}

fn header_string(headers: &HeaderMap, name: http::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

impl GitHubApi for OctocrabClient {
    async fn issue_events_page(
        &self,
        repo: &RepoId,
        page: u32,
        validator: Option<&str>,
    ) -> Result<EventsPage, GitHubApiError> {
        let route = format!(
            "/repos/{}/{}/issues/events?page={}",
            repo.owner, repo.repo, page
        );

        let mut headers = HeaderMap::new();
        if let Some(validator) = validator {
            let value = HeaderValue::from_str(validator).map_err(|e| {
                GitHubApiError::decode(format!("unusable validator {:?}", validator), e)
            })?;
            headers.insert(IF_NONE_MATCH, value);
        }

        let (status, headers, body) = self.get_raw(route, Some(headers)).await?;

        if status == StatusCode::NOT_MODIFIED {
            return Ok(EventsPage::NotModified);
        }
        if !status.is_success() {
            return Err(GitHubApiError::status(status.as_u16(), &body));
        }

        Ok(EventsPage::Fetched(IssueEventsResponse {
            body,
            etag: header_string(&headers, ETAG),
            link: header_string(&headers, LINK),
        }))
    }

    async fn repository(&self, repo: &RepoId) -> Result<String, GitHubApiError> {
        let route = format!("/repos/{}/{}", repo.owner, repo.repo);
        let (status, _, body) = self.get_raw(route, None).await?;
        if !status.is_success() {
            return Err(GitHubApiError::status(status.as_u16(), &body));
        }
        Ok(body)
    }
}
