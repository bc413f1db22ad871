//! Shared test utilities: a scripted GitHub API and property-test generators.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use crate::github::{EventsPage, GitHubApi, GitHubApiError, IssueEventsResponse};
use crate::persistence::Cursor;
use crate::types::RepoId;

pub fn arb_cursor() -> impl Strategy<Value = Cursor> {
    (
        prop_oneof![Just(String::new()), "W/\"[0-9a-f]{8,40}\"", "\"[0-9a-f]{8,40}\""],
        any::<u64>(),
    )
        .prop_map(|(validator, marker)| Cursor::new(validator, marker))
}

/// JSON for one issue-event record with small issue and actor objects.
pub fn event_record(id: u64, kind: &str) -> String {
    format!(
        r#"{{"id":{id},"event":"{kind}","actor":{{"login":"octocat","id":1}},"issue":{{"number":{id},"title":"Issue {id}"}},"created_at":"2024-01-15T12:00:00Z"}}"#
    )
}

/// JSON array body for a page of `(id, event)` records.
pub fn events_body(records: &[(u64, &str)]) -> String {
    let records: Vec<String> = records
        .iter()
        .map(|(id, kind)| event_record(*id, kind))
        .collect();
    format!("[{}]", records.join(","))
}

/// A scripted page response.
#[derive(Debug, Clone)]
pub enum FakePage {
    Body(String),
    NotModified,
    Fail,
}

#[derive(Debug, Default)]
struct FakeState {
    etag: Option<String>,
    pages: Vec<FakePage>,
    repository: Option<String>,
    fetches: Vec<(RepoId, u32, Option<String>)>,
    repository_fetches: usize,
}

/// In-memory [`GitHubApi`] serving the same scripted history for every repository.
///
/// Page 1 answers 304 when the request's validator equals the current ETag.
/// A `Link` header advertising the last page is attached whenever there is
/// more than one page. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakeGitHub {
    state: Arc<Mutex<FakeState>>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_etag(self, etag: &str) -> Self {
        self.set_etag(etag);
        self
    }

    pub fn with_pages(self, pages: Vec<String>) -> Self {
        self.set_pages(pages);
        self
    }

    pub fn with_raw_pages(self, pages: Vec<FakePage>) -> Self {
        self.state.lock().unwrap().pages = pages;
        self
    }

    pub fn with_repository(self, body: &str) -> Self {
        self.state.lock().unwrap().repository = Some(body.to_string());
        self
    }

    /// Makes the request for `page` fail with a transport-style error.
    pub fn failing_on_page(self, page: u32) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let index = (page - 1) as usize;
            if state.pages.len() <= index {
                state.pages.resize(index + 1, FakePage::Body("[]".to_string()));
            }
            state.pages[index] = FakePage::Fail;
        }
        self
    }

    pub fn set_etag(&self, etag: &str) {
        self.state.lock().unwrap().etag = Some(etag.to_string());
    }

    pub fn set_pages(&self, pages: Vec<String>) {
        self.state.lock().unwrap().pages = pages.into_iter().map(FakePage::Body).collect();
    }

    /// `(page, validator)` of every issue-events request, in order.
    pub fn fetches(&self) -> Vec<(u32, Option<String>)> {
        self.state
            .lock()
            .unwrap()
            .fetches
            .iter()
            .map(|(_, page, validator)| (*page, validator.clone()))
            .collect()
    }

    pub fn repository_fetches(&self) -> usize {
        self.state.lock().unwrap().repository_fetches
    }
}

impl GitHubApi for FakeGitHub {
    async fn issue_events_page(
        &self,
        repo: &RepoId,
        page: u32,
        validator: Option<&str>,
    ) -> Result<EventsPage, GitHubApiError> {
        let mut state = self.state.lock().unwrap();
        state
            .fetches
            .push((repo.clone(), page, validator.map(str::to_string)));

        if page == 1 && validator.is_some() && validator == state.etag.as_deref() {
            return Ok(EventsPage::NotModified);
        }

        let total = state.pages.len().max(1);
        let link = (total > 1).then(|| {
            format!(
                "<https://api.github.com/repositories/1/issues/events?page={}>; rel=\"next\", \
                 <https://api.github.com/repositories/1/issues/events?page={}>; rel=\"last\"",
                page + 1,
                total
            )
        });

        match state.pages.get((page - 1) as usize) {
            Some(FakePage::Body(body)) => Ok(EventsPage::Fetched(IssueEventsResponse {
                body: body.clone(),
                etag: if page == 1 { state.etag.clone() } else { None },
                link,
            })),
            Some(FakePage::NotModified) => Ok(EventsPage::NotModified),
            Some(FakePage::Fail) => Err(GitHubApiError::status(502, "Bad Gateway")),
            None => Ok(EventsPage::Fetched(IssueEventsResponse {
                body: "[]".to_string(),
                etag: state.etag.clone(),
                link,
            })),
        }
    }

    async fn repository(&self, _repo: &RepoId) -> Result<String, GitHubApiError> {
        let mut state = self.state.lock().unwrap();
        state.repository_fetches += 1;
        state
            .repository
            .clone()
            .ok_or_else(|| GitHubApiError::status(404, "Not Found"))
    }
}
