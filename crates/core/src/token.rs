//! Bearer token codec
//!
//! Access tokens are three dot-separated segments whose middle segment is a
//! base64-encoded JSON claims object. Nothing here verifies a signature; the
//! only thing the client needs from a token is when it stops being useful.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use serde::Deserialize;

/// Refresh this long before the embedded expiry.
pub const DEFAULT_EXPIRY_BUFFER_MS: i64 = 60_000;

/// Largest `exp` magnitude, in seconds, read as a real expiry.
const MAX_EXP_SECS: f64 = 1e13;

/// Claims the client cares about, decoded from an unverified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenClaims {
    /// Expiry as milliseconds since the Unix epoch
    pub expires_at_ms: Option<i64>,
}

#[derive(Deserialize)]
struct RawClaims {
    #[serde(default)]
    exp: Option<f64>,
}

/// Decode the claims segment of `token`.
///
/// Returns `None` when the token is not three segments or the middle segment
/// is not base64-encoded JSON. An `exp` too far from the epoch to be a real
/// timestamp is read as no expiry.
#[must_use]
pub fn decode(token: &str) -> Option<TokenClaims> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };

    let bytes = decode_segment(payload)?;
    let raw: RawClaims = serde_json::from_slice(&bytes).ok()?;

    #[allow(clippy::cast_possible_truncation)]
    let expires_at_ms = raw
        .exp
        .filter(|exp| exp.is_finite() && exp.abs() <= MAX_EXP_SECS)
        .map(|exp| (exp * 1000.0) as i64);

    Some(TokenClaims { expires_at_ms })
}

fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    let trimmed = segment.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD.decode(segment))
        .ok()
}

/// Expiry of `token` in epoch milliseconds, if it carries one.
#[must_use]
pub fn expires_at(token: &str) -> Option<i64> {
    decode(token).and_then(|claims| claims.expires_at_ms)
}

/// Whether `token` is expired (or within `buffer_ms` of expiring) at `now_ms`.
///
/// A token without a decodable expiry is treated as not expired.
#[must_use]
pub fn is_expired_at(token: &str, buffer_ms: i64, now_ms: i64) -> bool {
    expires_at(token).is_some_and(|expiry| now_ms >= expiry.saturating_sub(buffer_ms))
}

/// [`is_expired_at`] against the current wall clock.
#[must_use]
pub fn is_expired(token: &str, buffer_ms: i64) -> bool {
    is_expired_at(token, buffer_ms, crate::rt::now_ms())
}

/// Milliseconds from `now_ms` until the token should be refreshed.
///
/// `None` when the token has no expiry claim.
#[must_use]
pub fn refresh_delay_ms(token: &str, buffer_ms: i64, now_ms: i64) -> Option<i64> {
    expires_at(token).map(|expiry| expiry.saturating_sub(buffer_ms).saturating_sub(now_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with(claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.signature")
    }

    #[test]
    fn test_decode_reads_expiry_in_millis() {
        let token = token_with(&serde_json::json!({ "exp": 1_700_000_000, "sub": "u1" }));
        let claims = decode(&token).unwrap();
        assert_eq!(claims.expires_at_ms, Some(1_700_000_000_000));
    }

    #[test]
    fn test_decode_without_expiry() {
        let token = token_with(&serde_json::json!({ "sub": "u1" }));
        assert_eq!(decode(&token), Some(TokenClaims::default()));
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        assert!(decode("").is_none());
        assert!(decode("only.two").is_none());
        assert!(decode("a.b.c.d").is_none());
    }

    #[test]
    fn test_decode_rejects_garbage_payload() {
        assert!(decode("header.!!!not-base64!!!.sig").is_none());
        let not_json = URL_SAFE_NO_PAD.encode("plain text");
        assert!(decode(&format!("h.{not_json}.s")).is_none());
    }

    #[test]
    fn test_decode_accepts_padded_standard_base64() {
        let payload = STANDARD.encode(r#"{"exp":10}"#);
        let claims = decode(&format!("h.{payload}.s")).unwrap();
        assert_eq!(claims.expires_at_ms, Some(10_000));
    }

    #[test]
    fn test_missing_expiry_is_never_expired() {
        let token = token_with(&serde_json::json!({ "sub": "u1" }));
        assert!(!is_expired_at(&token, DEFAULT_EXPIRY_BUFFER_MS, i64::MAX));
        assert!(!is_expired("not-a-token", DEFAULT_EXPIRY_BUFFER_MS));
    }

    #[test]
    fn test_buffer_boundary() {
        let exp_secs = 1_700_000_000_i64;
        let token = token_with(&serde_json::json!({ "exp": exp_secs }));
        let expiry_ms = exp_secs * 1000;

        // 59 999 ms of life left is inside the 60 s buffer
        assert!(is_expired_at(&token, 60_000, expiry_ms - 59_999));
        // 60 001 ms of life left is not
        assert!(!is_expired_at(&token, 60_000, expiry_ms - 60_001));
        assert!(is_expired_at(&token, 60_000, expiry_ms - 60_000));
    }

    #[test]
    fn test_refresh_delay() {
        let token = token_with(&serde_json::json!({ "exp": 1_000 }));
        assert_eq!(refresh_delay_ms(&token, 60_000, 900_000), Some(40_000));
        assert_eq!(refresh_delay_ms(&token, 60_000, 950_000), Some(-10_000));
        assert_eq!(refresh_delay_ms("x.y", 60_000, 0), None);
    }

    #[test]
    fn test_absurd_expiry_is_no_expiry() {
        for exp in [-1e300, 1e300] {
            let token = token_with(&serde_json::json!({ "exp": exp }));
            assert_eq!(expires_at(&token), None);
            assert!(!is_expired_at(&token, 60_000, 0));
            assert_eq!(refresh_delay_ms(&token, 60_000, 0), None);
        }
    }

    #[test]
    fn test_extreme_clock_values_saturate() {
        let token = token_with(&serde_json::json!({ "exp": 1_000 }));
        assert!(!is_expired_at(&token, i64::MAX, i64::MIN));
        assert!(is_expired_at(&token, 0, i64::MAX));
        assert_eq!(refresh_delay_ms(&token, 60_000, i64::MIN), Some(i64::MAX));
        assert_eq!(refresh_delay_ms(&token, i64::MAX, i64::MAX), Some(i64::MIN));
    }
}
