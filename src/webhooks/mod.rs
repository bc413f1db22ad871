//! Webhook construction, signing and delivery.
//!
//! - [`signature`]: HMAC signatures over exact body bytes
//! - [`payload`]: `issues` payloads synthesized from rename events
//! - [`dispatch`]: target resolution and outbound HTTP delivery

pub mod dispatch;
pub mod payload;
pub mod signature;

pub use dispatch::{
    DELIVERY_HEADER, DispatchError, DispatchTarget, EVENT_HEADER, OutboundWebhook, Signature,
    WebhookDispatcher, resolve_targets,
};
pub use payload::{ISSUES_EVENT, RENAME_ACTION, RepositoryMetadata, repository_metadata, synthesize};
pub use signature::{
    SIGNATURE_256_HEADER, SIGNATURE_HEADER, SignatureAlgorithm, compute_signature,
    format_signature_header, sign_payload,
};
