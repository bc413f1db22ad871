//! Inbound webhook relay.
//!
//! GitHub delivers real webhooks to `POST /hook`. The body is forwarded
//! byte for byte to every endpoint configured for the payload's repository
//! and event type. GitHub's signature headers are passed through unchanged,
//! so receivers verify them with the secret configured on GitHub.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::types::{DeliveryId, RepoId};
use crate::webhooks::{
    DELIVERY_HEADER, EVENT_HEADER, OutboundWebhook, SIGNATURE_256_HEADER, SIGNATURE_HEADER,
    resolve_targets,
};

/// Reasons an inbound webhook is dropped without forwarding.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing required header.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// The body is not a JSON object with `repository.full_name`.
    #[error("invalid webhook body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// `repository.full_name` is not `owner/repo`.
    #[error("invalid repository name: {0:?}")]
    InvalidRepository(String),
}

/// GitHub retries on non-2xx, so a dropped webhook is still acknowledged.
impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (StatusCode::ACCEPTED, "Ignored").into_response()
    }
}

#[derive(Debug, Deserialize)]
struct InboundPayload {
    repository: InboundRepository,
}

#[derive(Debug, Deserialize)]
struct InboundRepository {
    full_name: String,
}

/// Relay handler.
///
/// # Response
///
/// Always 202 Accepted. The body is forwarded to every matching endpoint
/// when it names a repository and `X-GitHub-Event` is present; otherwise the
/// webhook is logged and dropped.
///
/// Failed forwards are logged and do not change the response.
pub async fn relay_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), RelayError> {
    let event_type = get_header(&headers, EVENT_HEADER).inspect_err(|e| {
        warn!(error = %e, "Dropping inbound webhook");
    })?;

    let repo = extract_repository(&body).inspect_err(|e| {
        warn!(event_type = %event_type, error = %e, "Dropping inbound webhook");
    })?;

    let delivery_id = get_header(&headers, DELIVERY_HEADER)
        .map(DeliveryId::new)
        .unwrap_or_else(|_| DeliveryId::generate());

    debug!(
        delivery_id = %delivery_id,
        event_type = %event_type,
        repo = %repo,
        "Received webhook"
    );

    let targets = resolve_targets(app_state.config(), &repo, &event_type);
    if targets.is_empty() {
        debug!(repo = %repo, event_type = %event_type, "No endpoints subscribed");
        return Ok((StatusCode::ACCEPTED, "Accepted"));
    }

    let webhook = OutboundWebhook::relayed(
        event_type,
        delivery_id,
        body,
        copy_headers(
            &headers,
            &[
                HeaderName::from_static(SIGNATURE_HEADER),
                HeaderName::from_static(SIGNATURE_256_HEADER),
            ],
        ),
        copy_headers(&headers, &[USER_AGENT, CONTENT_TYPE, ACCEPT]),
    );

    let delivered = app_state.dispatcher().dispatch_all(&targets, &webhook).await;
    info!(
        delivery_id = %webhook.delivery_id,
        repo = %repo,
        event_type = %webhook.event_type,
        delivered,
        targets = targets.len(),
        "Relayed webhook"
    );

    Ok((StatusCode::ACCEPTED, "Accepted"))
}

/// Extracts a required header value as a string.
fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, RelayError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(RelayError::MissingHeader(name))
}

/// Reads `repository.full_name` from a webhook body.
fn extract_repository(body: &[u8]) -> Result<RepoId, RelayError> {
    let payload: InboundPayload = serde_json::from_slice(body)?;
    RepoId::from_full_name(&payload.repository.full_name)
        .ok_or(RelayError::InvalidRepository(payload.repository.full_name))
}

/// Copies the named headers that are present, keeping their raw values.
fn copy_headers(headers: &HeaderMap, names: &[HeaderName]) -> HeaderMap {
    let mut copied = HeaderMap::new();
    for name in names {
        if let Some(value) = headers.get(name) {
            copied.insert(name.clone(), value.clone());
        }
    }
    copied
}
