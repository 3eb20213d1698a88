// Slack request signing (v0)
//
// X-Slack-Signature = "v0=" + hex(HMAC-SHA256(signing_secret, "v0:{ts}:{body}"))

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

const VERSION: &str = "v0";

/// Requests further than this from the local clock are replays
const TIMESTAMP_TOLERANCE_SECS: i64 = 5 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing Slack signature headers")]
    MissingHeaders,

    #[error("invalid Slack request timestamp")]
    InvalidTimestamp,

    #[error("Slack request timestamp outside tolerance")]
    Stale,

    #[error("Slack signature mismatch")]
    Mismatch,
}

/// Expected header value for a body signed at `timestamp`
pub fn compute_signature(secret: &str, timestamp: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    format!("{}={}", VERSION, hex_encode(&mac.finalize().into_bytes()))
}

/// Check one inbound request; `now` is unix seconds
pub fn verify_signature(
    secret: &str,
    timestamp: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
    now: i64,
) -> Result<(), SignatureError> {
    let (timestamp, signature) = match (timestamp, signature) {
        (Some(ts), Some(sig)) if !ts.is_empty() && !sig.is_empty() => (ts, sig),
        _ => return Err(SignatureError::MissingHeaders),
    };

    let ts: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp)?;
    if (now - ts).abs() > TIMESTAMP_TOLERANCE_SECS {
        tracing::warn!(ts, now, "Rejecting Slack request outside replay window");
        return Err(SignatureError::Stale);
    }

    let expected = compute_signature(secret, timestamp, body);
    if expected.is_empty() || !constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
        return Err(SignatureError::Mismatch);
    }
    Ok(())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Length-checked comparison that does not short-circuit on the first difference
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
