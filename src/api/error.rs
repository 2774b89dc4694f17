//! API client error types
//!
//! Every failure the transport can produce, carried back to the caller
//! with the HTTP status and response metadata where one exists.

use reqwest::header::HeaderMap;
use reqwest::{Response, StatusCode, Url};
use thiserror::Error;

/// Snapshot of a response kept on errors after the body has been consumed
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub status: StatusCode,
    pub url: Url,
    pub headers: HeaderMap,
}

impl ResponseMeta {
    pub fn from_response(response: &Response) -> Self {
        Self {
            status: response.status(),
            url: response.url().clone(),
            headers: response.headers().clone(),
        }
    }
}

/// Errors returned by [`ApiClient`](super::ApiClient)
#[derive(Error, Debug)]
pub enum ApiError {
    /// The call needed a token and none was stored; nothing was sent
    #[error("No authentication token found")]
    Unauthenticated,

    /// The server rejected the stored token with 401
    #[error("Session expired")]
    SessionExpired { response: ResponseMeta },

    /// Any other non-2xx response
    #[error("API error {status}: {message}")]
    Http {
        status: u16,
        message: String,
        response: ResponseMeta,
    },

    /// The request never produced a response (offline, DNS, timeout)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A token or response body could not be parsed
    #[error("Decode error: {0}")]
    Decode(String),

    /// A request body could not be serialized
    #[error("Encode error: {0}")]
    Encode(String),
}

impl ApiError {
    /// HTTP status associated with the failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthenticated => Some(401),
            ApiError::SessionExpired { response } => Some(response.status.as_u16()),
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            ApiError::Decode(_) | ApiError::Encode(_) => None,
        }
    }

    /// The `detail` field of a JSON error body, falling back to the raw text
    ///
    /// The backend reports failures as `{"detail": "..."}`.
    pub fn detail(&self) -> Option<String> {
        match self {
            ApiError::Http { message, .. } => Some(extract_detail(message)),
            _ => None,
        }
    }
}

fn extract_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| match v.get("detail") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) if !other.is_null() => Some(other.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| body.to_string())
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_detail() {
        assert_eq!(
            extract_detail(r#"{"detail":"Incorrect username or password"}"#),
            "Incorrect username or password"
        );
        assert_eq!(extract_detail("plain text"), "plain text");
        assert_eq!(extract_detail(r#"{"other":1}"#), r#"{"other":1}"#);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            ApiError::Unauthenticated.to_string(),
            "No authentication token found"
        );
        assert_eq!(ApiError::Unauthenticated.status(), Some(401));
        assert_eq!(ApiError::Decode("x".into()).status(), None);
    }
}
