//! GitHub API access.
//!
//! - [`GitHubApi`]: the operations the poller needs, as a trait
//! - [`OctocrabClient`]: the octocrab-backed implementation, one per account
//! - [`last_page`]: `Link` header pagination

mod api;
mod client;
mod error;
mod link;

pub use api::{EventsPage, GitHubApi, IssueEventsResponse};
pub use client::{GITHUB_API_URL, OctocrabClient};
pub use error::{GitHubApiError, GitHubErrorKind};
pub use link::last_page;
