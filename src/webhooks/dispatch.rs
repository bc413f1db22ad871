//! Outbound webhook delivery.
//!
//! [`resolve_targets`] picks the configured endpoints for an event, and
//! [`WebhookDispatcher`] POSTs a [`OutboundWebhook`] to each of them.
//!
//! Delivery is best-effort: one attempt per target, bounded by a per-request
//! timeout so an unreachable endpoint cannot hold up the poll loop. Failures
//! are logged by [`WebhookDispatcher::dispatch_all`] and never retried; the
//! cursor has already moved past the event.

use std::time::Duration;

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use http::StatusCode;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::signature::{SIGNATURE_HEADER, sign_payload};
use crate::config::Config;
use crate::types::{DeliveryId, RepoId};

/// Header naming the webhook event type.
pub const EVENT_HEADER: &str = "x-github-event";

/// Header carrying the unique delivery ID.
pub const DELIVERY_HEADER: &str = "x-github-delivery";

/// User agent for webhooks hooksim originates.
pub const DEFAULT_USER_AGENT: &str = "hooksim";

/// Default per-request timeout for outbound deliveries.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from a single delivery attempt.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request failed before a response was received (including timeout).
    #[error("delivery to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A header value could not be encoded.
    #[error("invalid header value for {0}")]
    InvalidHeader(&'static str),
}

/// One endpoint an event should be delivered to.
#[derive(Clone, PartialEq, Eq)]
pub struct DispatchTarget {
    pub url: String,
    pub secret: Option<String>,
}

impl std::fmt::Debug for DispatchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTarget")
            .field("url", &self.url)
            .field("signed", &self.secret.is_some())
            .finish()
    }
}

/// Returns every configured endpoint subscribed to `event_type` on `repo`.
///
/// Every hook of every account owning `repo` is considered, so one event can
/// fan out to many endpoints. Targets are returned in configuration order.
pub fn resolve_targets(config: &Config, repo: &RepoId, event_type: &str) -> Vec<DispatchTarget> {
    config
        .accounts
        .iter()
        .filter(|account| account.user == repo.owner)
        .flat_map(|account| account.hooks.iter())
        .filter(|hook| hook.repo == repo.repo && hook.events.matches(event_type))
        .map(|hook| DispatchTarget {
            url: hook.url.clone(),
            secret: hook.secret.clone(),
        })
        .collect()
}

/// How the signature header of an outbound webhook is produced.
#[derive(Debug, Clone)]
pub enum Signature {
    /// Sign the body with each target's secret; unsigned if it has none.
    PerTarget,

    /// Forward signature headers received from GitHub unchanged.
    Preserve(HeaderMap),
}

/// A webhook ready to be POSTed to one or more targets.
#[derive(Debug, Clone)]
pub struct OutboundWebhook {
    pub event_type: String,
    pub delivery_id: DeliveryId,
    pub body: Bytes,
    pub signature: Signature,
    /// Replaces the default `User-Agent`, `Accept` or `Content-Type` values.
    pub header_overrides: HeaderMap,
}

impl OutboundWebhook {
    /// A webhook hooksim originates: fresh delivery ID, signed per target.
    pub fn synthesized(event_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        OutboundWebhook {
            event_type: event_type.into(),
            delivery_id: DeliveryId::generate(),
            body: body.into(),
            signature: Signature::PerTarget,
            header_overrides: HeaderMap::new(),
        }
    }

    /// A webhook received from GitHub and forwarded with its own signature.
    pub fn relayed(
        event_type: impl Into<String>,
        delivery_id: DeliveryId,
        body: impl Into<Bytes>,
        signature_headers: HeaderMap,
        header_overrides: HeaderMap,
    ) -> Self {
        OutboundWebhook {
            event_type: event_type.into(),
            delivery_id,
            body: body.into(),
            signature: Signature::Preserve(signature_headers),
            header_overrides,
        }
    }

    /// Builds the request headers for delivery to `target`.
    pub fn headers_for(&self, target: &DispatchTarget) -> Result<HeaderMap, DispatchError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        for (name, value) in &self.header_overrides {
            headers.insert(name.clone(), value.clone());
        }

        headers.insert(
            HeaderName::from_static(EVENT_HEADER),
            HeaderValue::from_str(&self.event_type)
                .map_err(|_| DispatchError::InvalidHeader(EVENT_HEADER))?,
        );
        headers.insert(
            HeaderName::from_static(DELIVERY_HEADER),
            HeaderValue::from_str(self.delivery_id.as_str())
                .map_err(|_| DispatchError::InvalidHeader(DELIVERY_HEADER))?,
        );

        match &self.signature {
            Signature::PerTarget => {
                if let Some(secret) = target.secret.as_deref().filter(|s| !s.is_empty()) {
                    let value = sign_payload(&self.body, secret.as_bytes());
                    headers.insert(
                        HeaderName::from_static(SIGNATURE_HEADER),
                        HeaderValue::from_str(&value)
                            .map_err(|_| DispatchError::InvalidHeader(SIGNATURE_HEADER))?,
                    );
                }
            }
            Signature::Preserve(signature_headers) => {
                for (name, value) in signature_headers {
                    headers.insert(name.clone(), value.clone());
                }
            }
        }

        Ok(headers)
    }
}

/// Sends webhooks over a shared HTTP client.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
}

impl WebhookDispatcher {
    /// Creates a dispatcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(DispatchError::Client)?;
        Ok(WebhookDispatcher { client })
    }

    /// POSTs `webhook` to one target and returns the response status.
    ///
    /// The exact bytes of `webhook.body` are sent; the signature covers them.
    pub async fn dispatch(
        &self,
        target: &DispatchTarget,
        webhook: &OutboundWebhook,
    ) -> Result<StatusCode, DispatchError> {
        let headers = webhook.headers_for(target)?;

        let response = self
            .client
            .post(&target.url)
            .headers(headers)
            .body(webhook.body.clone())
            .send()
            .await
            .map_err(|source| DispatchError::Transport {
                url: target.url.clone(),
                source,
            })?;

        // The response body is not needed; dropping the response releases it.
        Ok(response.status())
    }

    /// Delivers `webhook` to every target in turn, logging failures.
    ///
    /// Returns the number of targets that answered with a 2xx status.
    pub async fn dispatch_all(&self, targets: &[DispatchTarget], webhook: &OutboundWebhook) -> usize {
        let mut delivered = 0;
        for target in targets {
            match self.dispatch(target, webhook).await {
                Ok(status) if status.is_success() => {
                    debug!(
                        url = %target.url,
                        delivery_id = %webhook.delivery_id,
                        event_type = %webhook.event_type,
                        status = %status,
                        "Webhook delivered"
                    );
                    delivered += 1;
                }
                Ok(status) => {
                    warn!(
                        url = %target.url,
                        delivery_id = %webhook.delivery_id,
                        status = %status,
                        "Webhook endpoint rejected delivery"
                    );
                }
                Err(e) => {
                    warn!(
                        url = %target.url,
                        delivery_id = %webhook.delivery_id,
                        error = %e,
                        "Webhook delivery failed"
                    );
                }
            }
        }
        info!(
            delivery_id = %webhook.delivery_id,
            event_type = %webhook.event_type,
            delivered,
            targets = targets.len(),
            "Webhook dispatched"
        );
        delivered
    }
}
