//! Incremental reconciliation of a repository's issue events.
//!
//! GitHub does not send a webhook when an issue's title is edited, but the
//! issue-events endpoint records it as a `renamed` event. Each reconciliation
//! walks that endpoint newest-first, starting from page 1, and stops as soon
//! as it reaches an event the stored [`Cursor`] says was already processed.
//!
//! # Conditional Requests
//!
//! Page 1 is requested with `If-None-Match: <validator>`. A 304 answer means
//! nothing changed; the cycle ends after one request and does not count
//! against the rate limit. Later pages are always fetched unconditionally.
//!
//! # Cursor Advancement
//!
//! The new cursor takes the page-1 `ETag` and the highest event ID observed,
//! never less than the previous marker. On any error the caller keeps its
//! previous cursor, so the next cycle retries the same range.
//!
//! A zero marker (first poll of a repository) disables the early stop: every
//! page is scanned and every rename in the available history is reported.

use serde::Deserialize;
use serde_json::value::RawValue;
use thiserror::Error;
use tracing::{debug, trace};

use crate::github::{EventsPage, GitHubApi, GitHubApiError, IssueEventsResponse, last_page};
use crate::persistence::Cursor;
use crate::types::{EventId, RepoId};

/// Issue-event type GitHub records when an issue's title changes.
pub const RENAMED_EVENT: &str = "renamed";

/// Errors that abort a reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Fetching a page failed.
    #[error(transparent)]
    GitHub(#[from] GitHubApiError),

    /// A page body was not an array of issue events.
    #[error("malformed issue events on page {page}: {source}")]
    Decode {
        page: u32,
        #[source]
        source: serde_json::Error,
    },

    /// A continuation page answered 304 even though no validator was sent.
    #[error("unexpected 304 Not Modified for page {page}")]
    UnexpectedNotModified { page: u32 },
}

/// A rename event that has not been forwarded yet.
///
/// The issue and actor objects are kept as the exact JSON text GitHub sent
/// and are forwarded without being re-encoded.
#[derive(Debug, Clone)]
pub struct CandidateEvent {
    pub id: EventId,
    pub issue: Option<Box<RawValue>>,
    pub actor: Option<Box<RawValue>>,
}

/// Result of one reconciliation cycle.
#[derive(Debug)]
pub enum Reconciliation {
    /// Page 1 answered 304: the cursor stays as it is.
    Unchanged,

    /// The history was scanned.
    Updated {
        /// Cursor to store for the next cycle.
        cursor: Cursor,
        /// New rename events, newest first.
        events: Vec<CandidateEvent>,
        /// Number of pages fetched.
        pages: u32,
    },
}

/// One record of `GET /repos/{owner}/{repo}/issues/events`.
#[derive(Debug, Deserialize)]
struct IssueEventRecord {
    id: EventId,
    event: String,
    #[serde(default)]
    issue: Option<Box<RawValue>>,
    #[serde(default)]
    actor: Option<Box<RawValue>>,
}

/// Whether scanning may continue onto the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanOutcome {
    Continue,
    ReachedCursor,
}

/// Scan state carried across pages.
#[derive(Debug)]
struct Scan {
    stop_at: EventId,
    high_water: EventId,
    events: Vec<CandidateEvent>,
}

impl Scan {
    fn new(cursor: &Cursor) -> Self {
        Scan {
            stop_at: cursor.marker,
            high_water: cursor.marker,
            events: Vec::new(),
        }
    }

    fn consume(&mut self, records: Vec<IssueEventRecord>) -> ScanOutcome {
        for record in records {
            // Pages are sorted newest-first, but the maximum is tracked anyway.
            self.high_water = self.high_water.max(record.id);

            if !self.stop_at.is_zero() && record.id <= self.stop_at {
                return ScanOutcome::ReachedCursor;
            }

            trace!(id = %record.id, event = %record.event, "Unseen issue event");

            if record.event == RENAMED_EVENT {
                self.events.push(CandidateEvent {
                    id: record.id,
                    issue: record.issue,
                    actor: record.actor,
                });
            }
        }
        ScanOutcome::Continue
    }
}

fn decode_page(
    response: &IssueEventsResponse,
    page: u32,
) -> Result<Vec<IssueEventRecord>, ReconcileError> {
    serde_json::from_str(&response.body).map_err(|source| ReconcileError::Decode { page, source })
}

/// Scans `repo`'s issue events that are newer than `cursor`.
pub async fn reconcile<A: GitHubApi>(
    api: &A,
    repo: &RepoId,
    cursor: &Cursor,
) -> Result<Reconciliation, ReconcileError> {
    let first = match api.issue_events_page(repo, 1, cursor.validator()).await? {
        EventsPage::NotModified => {
            debug!(repo = %repo, "Issue events not modified");
            return Ok(Reconciliation::Unchanged);
        }
        EventsPage::Fetched(response) => response,
    };

    let validator = first.etag.clone().unwrap_or_default();
    let last = first.link.as_deref().and_then(last_page).unwrap_or(1);

    let mut scan = Scan::new(cursor);
    let mut page = 1;
    let mut response = first;

    loop {
        let records = decode_page(&response, page)?;
        if scan.consume(records) == ScanOutcome::ReachedCursor {
            debug!(repo = %repo, page, "Reached stored cursor");
            break;
        }
        if page >= last {
            break;
        }

        page += 1;
        response = match api.issue_events_page(repo, page, None).await? {
            EventsPage::Fetched(response) => response,
            EventsPage::NotModified => return Err(ReconcileError::UnexpectedNotModified { page }),
        };
    }

    debug!(
        repo = %repo,
        pages = page,
        marker = %scan.high_water,
        renames = scan.events.len(),
        "Reconciled issue events"
    );

    Ok(Reconciliation::Updated {
        cursor: Cursor {
            validator,
            marker: scan.high_water,
        },
        events: scan.events,
        pages: page,
    })
}
