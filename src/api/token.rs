//! Bearer token inspection
//!
//! Reads the claims of a JWT-shaped token without verifying its signature.
//! Only used to decide whether a stored token is worth sending.

use super::error::{ApiError, ApiResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

/// The claims this client cares about
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Expiry, seconds since the epoch
    pub exp: f64,
    #[serde(default)]
    pub sub: Option<String>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let millis = (self.exp * 1000.0) as i64;
        Utc.timestamp_millis_opt(millis).single()
    }
}

/// Decode the payload segment of a `header.payload.signature` token
pub fn decode_claims(token: &str) -> ApiResult<TokenClaims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(ApiError::Decode(format!(
            "expected 3 token segments, found {}",
            segments.len()
        )));
    }

    let payload = segments[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| ApiError::Decode(e.to_string()))?;

    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

/// True when the token is expired at `now` or cannot be decoded
pub fn is_token_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    match decode_claims(token) {
        Ok(claims) => {
            let now_secs = now.timestamp_millis() as f64 / 1000.0;
            now_secs >= claims.exp
        }
        Err(e) => {
            tracing::debug!(error = %e, "Treating undecodable token as expired");
            true
        }
    }
}

/// True when the token is expired now or cannot be decoded
pub fn is_token_expired(token: &str) -> bool {
    is_token_expired_at(token, Utc::now())
}

#[cfg(test)]
pub(crate) fn make_token(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.signature", header, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_expiry_boundary() {
        let exp = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let token = make_token(&json!({ "sub": "jane@example.com", "exp": exp.timestamp() }));

        assert!(!is_token_expired_at(&token, exp - Duration::seconds(1)));
        assert!(!is_token_expired_at(&token, exp - Duration::milliseconds(1)));
        assert!(is_token_expired_at(&token, exp));
        assert!(is_token_expired_at(&token, exp + Duration::days(3)));
    }

    #[test]
    fn test_claims_decode() {
        let token = make_token(&json!({ "sub": "jane@example.com", "exp": 1_900_000_000 }));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("jane@example.com"));
        assert_eq!(claims.expires_at().unwrap().timestamp(), 1_900_000_000);
    }

    #[test]
    fn test_malformed_tokens_are_expired() {
        let now = Utc::now();
        assert!(is_token_expired_at("", now));
        assert!(is_token_expired_at("only-one-segment", now));
        assert!(is_token_expired_at("a.b", now));
        assert!(is_token_expired_at("a.b.c.d", now));
        assert!(is_token_expired_at("a.!!!.c", now));

        // Valid base64, not JSON
        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("hello"));
        assert!(is_token_expired_at(&not_json, now));

        // JSON without an exp claim
        let no_exp = make_token(&json!({ "sub": "x" }));
        assert!(is_token_expired_at(&no_exp, now));
    }

    #[test]
    fn test_padded_payload_accepted() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(r#"{"exp":4102444800.0}"#);
        assert!(payload.ends_with('='));
        let token = format!("h.{}.s", payload);
        assert!(!is_token_expired_at(&token, Utc::now()));
    }
}
