//! Rename detection by polling issue events.
//!
//! - [`reconcile`](reconcile()): one incremental scan of a repository's history
//! - [`Scheduler`]: the long-running loop visiting every repository
//! - [`PollConfig`]: visit cadence

pub mod poll;
pub mod reconcile;
pub mod scheduler;

pub use poll::PollConfig;
pub use reconcile::{CandidateEvent, RENAMED_EVENT, ReconcileError, Reconciliation, reconcile};
pub use scheduler::Scheduler;
