//! hooksim - synthesizes GitHub webhooks that GitHub itself never sends.
//!
//! GitHub emits no webhook when an issue is renamed. hooksim polls each
//! watched repository's issue events, turns every new `renamed` event into an
//! `issues` webhook, signs it, and POSTs it to the configured endpoints. It
//! also relays real GitHub webhooks to the same endpoints.

pub mod cli;
pub mod config;
pub mod github;
pub mod persistence;
pub mod poller;
pub mod server;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub mod test_utils;
