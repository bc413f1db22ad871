//! Core domain types for hooksim.

pub mod ids;

pub use ids::{DeliveryId, EventId, RepoId};
