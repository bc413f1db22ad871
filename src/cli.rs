//! Command-line interface.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::github::GITHUB_API_URL;

/// Synthesizes GitHub webhooks for issue renames and relays real ones.
#[derive(Debug, Parser)]
#[command(name = "hooksim")]
#[command(version)]
pub struct Cli {
    /// Port for the inbound webhook listener
    #[arg(short, long, env = "HOOKSIM_PORT", default_value_t = 9000)]
    pub port: u16,

    /// Seconds to cycle through every watched repository
    #[arg(short, long, env = "HOOKSIM_INTERVAL", default_value_t = 5)]
    pub interval: u64,

    /// Path to the JSON account and hook configuration
    #[arg(short, long, env = "HOOKSIM_CONFIG", default_value = "config.json")]
    pub config: PathBuf,

    /// Directory holding per-repository cursors
    #[arg(long, env = "HOOKSIM_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Base URL of the GitHub REST API
    #[arg(long, env = "HOOKSIM_API_BASE", default_value = GITHUB_API_URL)]
    pub api_base: String,

    /// Seconds before an outbound webhook delivery is abandoned
    #[arg(long, env = "HOOKSIM_DISPATCH_TIMEOUT", default_value_t = 10)]
    pub dispatch_timeout: u64,

    /// Seconds in-flight requests may take to finish on shutdown
    #[arg(long, env = "HOOKSIM_SHUTDOWN_GRACE", default_value_t = 5)]
    pub shutdown_grace: u64,

    /// Enable debug logging
    #[arg(short, long, env = "HOOKSIM_VERBOSE")]
    pub verbose: bool,
}

impl Cli {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace)
    }

    /// Default tracing filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "hooksim=debug,tower_http=debug"
        } else {
            "hooksim=info,tower_http=info"
        }
    }
}
