//! Webhook payload signatures.
//!
//! GitHub-style webhooks carry an HMAC of the exact body bytes, keyed with the
//! hook's secret, as a hex digest with an algorithm prefix:
//!
//! - `X-Hub-Signature: sha1=<hex>` (what hooksim produces)
//! - `X-Hub-Signature-256: sha256=<hex>`
//!
//! The signature must be computed over the bytes actually transmitted; any
//! re-serialization of the JSON would change it.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// Header carrying the HMAC-SHA1 signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature";

/// Header carrying the HMAC-SHA256 signature.
pub const SIGNATURE_256_HEADER: &str = "x-hub-signature-256";

/// HMAC digest algorithms used for webhook signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Sha1,
    Sha256,
}

impl SignatureAlgorithm {
    /// The prefix used in the header value, without the `=`.
    pub fn prefix(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha1 => "sha1",
            SignatureAlgorithm::Sha256 => "sha256",
        }
    }
}

/// Computes the HMAC of `payload` keyed with `secret`.
pub fn compute_signature(algorithm: SignatureAlgorithm, payload: &[u8], secret: &[u8]) -> Vec<u8> {
    match algorithm {
        SignatureAlgorithm::Sha1 => {
            let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC can take key of any size");
            mac.update(payload);
            mac.finalize().into_bytes().to_vec()
        }
        SignatureAlgorithm::Sha256 => {
            let mut mac =
                HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
            mac.update(payload);
            mac.finalize().into_bytes().to_vec()
        }
    }
}

/// Formats a signature as a header value, e.g. `sha1=<hex>`.
pub fn format_signature_header(algorithm: SignatureAlgorithm, signature: &[u8]) -> String {
    format!("{}={}", algorithm.prefix(), hex::encode(signature))
}

/// Computes and formats the `X-Hub-Signature` value for a payload.
pub fn sign_payload(payload: &[u8], secret: &[u8]) -> String {
    let signature = compute_signature(SignatureAlgorithm::Sha1, payload, secret);
    format_signature_header(SignatureAlgorithm::Sha1, &signature)
}

/// Parses a header value such as `sha1=abc123...` into its algorithm and bytes.
///
/// Returns `None` for malformed headers. Never panics.
#[cfg(test)]
pub(crate) fn parse_signature_header(header: &str) -> Option<(SignatureAlgorithm, Vec<u8>)> {
    let (prefix, hex_sig) = header.split_once('=')?;
    let algorithm = match prefix {
        "sha1" => SignatureAlgorithm::Sha1,
        "sha256" => SignatureAlgorithm::Sha256,
        _ => return None,
    };
    hex::decode(hex_sig).ok().map(|bytes| (algorithm, bytes))
}

/// Verifies a signature header the way a receiving endpoint would.
///
/// Accepts either algorithm. Uses constant-time comparison.
#[cfg(test)]
pub(crate) fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Some((algorithm, expected)) = parse_signature_header(signature_header) else {
        return false;
    };

    match algorithm {
        SignatureAlgorithm::Sha1 => match HmacSha1::new_from_slice(secret) {
            Ok(mut mac) => {
                mac.update(payload);
                mac.verify_slice(&expected).is_ok()
            }
            Err(_) => false,
        },
        SignatureAlgorithm::Sha256 => match HmacSha256::new_from_slice(secret) {
            Ok(mut mac) => {
                mac.update(payload);
                mac.verify_slice(&expected).is_ok()
            }
            Err(_) => false,
        },
    }
}
