use crate::api::dto::error::ErrorBody;
use reqwest::StatusCode;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error("Rate limited")]
    RateLimited,
    #[error("Validation failed: {message}")]
    Validation { message: String, fields: BTreeMap<String, Vec<String>> },
    #[error("Not found")]
    NotFound,
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Session expired")]
    SessionExpired,
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Realtime error: {0}")]
    Realtime(String),
    /// A refresh exchange failed without ending the session. Every caller that
    /// was waiting on that exchange receives the same error.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[source] Arc<ClientError>),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Maps a non-success response into the error taxonomy.
    ///
    /// The body is parsed leniently: backends that answer with plain text or an
    /// unexpected JSON shape still produce a usable message.
    #[must_use]
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed
            .message
            .or(parsed.error)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());

        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::FORBIDDEN => Self::Forbidden,
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited,
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Self::Validation { message, fields: parsed.errors.unwrap_or_default() }
            }
            _ => Self::Api { status: status.as_u16(), message },
        }
    }

    /// Whether a failed request may be attempted again unchanged.
    ///
    /// Auth and rate-limit rejections are never retried, nor are client errors
    /// that would fail identically on the next attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => !e.is_decode() && !e.is_builder(),
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status associated with the error, if it originated from a response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Forbidden => Some(403),
            Self::NotFound => Some(404),
            Self::RateLimited => Some(429),
            Self::Validation { .. } => Some(400),
            Self::Api { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            Self::RefreshFailed(e) => e.status(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(ClientError::from_response(StatusCode::UNAUTHORIZED, ""), ClientError::Unauthorized));
        assert!(matches!(ClientError::from_response(StatusCode::FORBIDDEN, ""), ClientError::Forbidden));
        assert!(matches!(ClientError::from_response(StatusCode::TOO_MANY_REQUESTS, ""), ClientError::RateLimited));
        assert!(matches!(ClientError::from_response(StatusCode::NOT_FOUND, ""), ClientError::NotFound));
    }

    #[test]
    fn test_validation_fields_are_kept() {
        let body = r#"{"message":"Invalid input","errors":{"email":["is required"]}}"#;
        match ClientError::from_response(StatusCode::BAD_REQUEST, body) {
            ClientError::Validation { message, fields } => {
                assert_eq!(message, "Invalid input");
                assert_eq!(fields["email"], vec!["is required".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_api_message_falls_back_to_reason() {
        match ClientError::from_response(StatusCode::BAD_GATEWAY, "<html>oops</html>") {
            ClientError::Api { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_retry_policy() {
        assert!(ClientError::Api { status: 503, message: String::new() }.is_retryable());
        assert!(!ClientError::Api { status: 409, message: String::new() }.is_retryable());
        assert!(!ClientError::Unauthorized.is_retryable());
        assert!(!ClientError::Forbidden.is_retryable());
        assert!(!ClientError::RateLimited.is_retryable());
        assert!(!ClientError::NotFound.is_retryable());
    }

    #[test]
    fn test_refresh_failure_keeps_status() {
        let err = ClientError::RefreshFailed(Arc::new(ClientError::Api { status: 502, message: "Bad Gateway".into() }));
        assert_eq!(err.status(), Some(502));
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Token refresh failed: API error (502): Bad Gateway");
    }
}
