//! Diagnostic echo endpoint.
//!
//! `POST /hookTester` logs whatever it receives together with the signatures
//! the body would carry under a fixed test secret. Point a hook at it to
//! inspect what hooksim (or GitHub) sends.

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use tracing::info;

use crate::webhooks::{SignatureAlgorithm, compute_signature, format_signature_header};

/// Secret the echo endpoint signs with.
pub const TEST_SECRET: &str = "test1234";

/// Echo handler. Always answers 200 OK.
pub async fn echo_handler(headers: HeaderMap, body: Bytes) -> (StatusCode, &'static str) {
    for (name, value) in &headers {
        info!(
            header = %name,
            value = %String::from_utf8_lossy(value.as_bytes()),
            "Test hook header"
        );
    }

    let sha1 = expected_signature(SignatureAlgorithm::Sha1, &body);
    let sha256 = expected_signature(SignatureAlgorithm::Sha256, &body);
    info!(
        body = %String::from_utf8_lossy(&body),
        expected_signature = %sha1,
        expected_signature_256 = %sha256,
        "Test hook received"
    );

    (StatusCode::OK, "OK")
}

/// Signature header value for `body` under [`TEST_SECRET`].
pub fn expected_signature(algorithm: SignatureAlgorithm, body: &[u8]) -> String {
    let signature = compute_signature(algorithm, body, TEST_SECRET.as_bytes());
    format_signature_header(algorithm, &signature)
}
