//! Polling cadence.
//!
//! Every configured repository is visited once per interval. Visits are
//! spread evenly across the interval rather than bunched at its start, so a
//! deployment watching N repositories issues one request roughly every
//! `interval / N`.

use std::time::Duration;

/// Default time to cycle through every repository (5 seconds).
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Pause used when there is nothing to poll.
const IDLE_DELAY_SECS: u64 = 60;

/// Configuration for the polling loop.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Time to visit every repository once.
    ///
    /// Default: 5 seconds. Configure via `--interval` or `HOOKSIM_INTERVAL`.
    pub poll_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PollConfig {
    /// Creates a new `PollConfig` with default values.
    pub fn new() -> Self {
        PollConfig {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }

    pub fn with_interval(poll_interval: Duration) -> Self {
        PollConfig { poll_interval }
    }

    /// Returns the pause between consecutive repository visits.
    ///
    /// With no repositories the loop has nothing to do; it sleeps for a long
    /// idle period and relies on cancellation to wake it. Counts beyond
    /// `u32::MAX` are treated as `u32::MAX`.
    pub fn visit_delay(&self, repo_count: usize) -> Duration {
        if repo_count == 0 {
            return Duration::from_secs(IDLE_DELAY_SECS);
        }
        let count = u32::try_from(repo_count).unwrap_or(u32::MAX);
        self.poll_interval / count
    }
}
