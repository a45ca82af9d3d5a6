//! Reads the expiry claim of an access token.
//!
//! Signatures are never checked here; the server does that. Anything that
//! does not decode is reported as expiring so the caller refreshes instead of
//! sending a token that will be rejected.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Claims {
    exp: Option<f64>,
}

/// Expiry of `token` in epoch seconds, or `None` if it is malformed.
pub fn decode(token: &str) -> Option<i64> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    let payload = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Claims = serde_json::from_slice(&payload).ok()?;
    claims
        .exp
        .filter(|exp| exp.is_finite())
        .map(|exp| exp.floor() as i64)
}

pub fn is_expiring_soon(token: &str, lead: Duration) -> bool {
    is_expiring_soon_at(token, lead, SystemTime::now())
}

pub fn is_expiring_soon_at(token: &str, lead: Duration, now: SystemTime) -> bool {
    let Some(exp) = decode(token) else {
        return true;
    };
    let now_ms = now
        .duration_since(UNIX_EPOCH)
        .map(|since| since.as_millis() as i128)
        .unwrap_or_default();
    i128::from(exp) * 1000 <= now_ms + lead.as_millis() as i128
}
