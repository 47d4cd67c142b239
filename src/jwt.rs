//! Signature-less inspection of access tokens.
//!
//! The backend that issued a token has already validated it; the client only
//! reads claims to decide when a session needs refreshing. Every function here
//! treats an undecodable token the same as an expired one.

use crate::domain::claims::JwtClaims;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Tokens are considered expired this long before their `exp` claim.
pub const DEFAULT_EXPIRY_BUFFER: Duration = Duration::from_secs(30);

/// Window in which a still-valid token is reported as expiring soon.
pub const DEFAULT_EXPIRING_SOON_WINDOW: Duration = Duration::from_secs(3 * 60);

/// Decodes the payload segment of a JWT. Returns `None` for anything malformed.
#[must_use]
pub fn decode_jwt(token: &str) -> Option<JwtClaims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        tracing::debug!(segments = segments.len(), "Malformed JWT: unexpected segment count");
        return None;
    }

    // Some issuers encode with the standard alphabet (`+`, `/`) instead of base64url.
    let segment = segments[1].trim_end_matches('=');
    let payload = match URL_SAFE_NO_PAD.decode(segment).or_else(|_| STANDARD_NO_PAD.decode(segment)) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "Malformed JWT: payload is not base64");
            return None;
        }
    };

    match serde_json::from_slice::<JwtClaims>(&payload) {
        Ok(claims) => Some(claims),
        Err(e) => {
            tracing::debug!(error = %e, "Malformed JWT: payload is not a JSON object");
            None
        }
    }
}

#[must_use]
pub fn is_token_expired(token: &str, buffer: Duration) -> bool {
    is_token_expired_at(token, buffer, SystemTime::now())
}

#[must_use]
pub fn is_token_expired_at(token: &str, buffer: Duration, now: SystemTime) -> bool {
    if token.is_empty() {
        return true;
    }
    let Some(exp) = decode_jwt(token).and_then(|c| c.exp) else {
        return true;
    };

    let buffer_ms = i64::try_from(buffer.as_millis()).unwrap_or(i64::MAX);
    unix_millis(now) >= exp.saturating_mul(1000).saturating_sub(buffer_ms)
}

/// Time left until the `exp` claim, floored at zero.
#[must_use]
pub fn token_remaining_time(token: &str) -> Duration {
    token_remaining_time_at(token, SystemTime::now())
}

#[must_use]
pub fn token_remaining_time_at(token: &str, now: SystemTime) -> Duration {
    let Some(exp) = decode_jwt(token).and_then(|c| c.exp) else {
        return Duration::ZERO;
    };

    let remaining_ms = exp.saturating_mul(1000).saturating_sub(unix_millis(now));
    u64::try_from(remaining_ms).map_or(Duration::ZERO, Duration::from_millis)
}

/// True only while the token is still valid but inside `window`. A token that
/// has already expired is not "expiring soon".
#[must_use]
pub fn is_token_expiring_soon(token: &str, window: Duration) -> bool {
    is_token_expiring_soon_at(token, window, SystemTime::now())
}

#[must_use]
pub fn is_token_expiring_soon_at(token: &str, window: Duration, now: SystemTime) -> bool {
    let remaining = token_remaining_time_at(token, now);
    !remaining.is_zero() && remaining <= window
}

fn unix_millis(at: SystemTime) -> i64 {
    at.duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW_SECS: u64 = 1_700_000_000;

    fn now() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(NOW_SECS)
    }

    fn token_with_payload(payload: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        format!("{header}.{}.signature", URL_SAFE_NO_PAD.encode(payload))
    }

    fn token_expiring_in(secs: i64) -> String {
        let exp = i64::try_from(NOW_SECS).unwrap() + secs;
        token_with_payload(&format!(r#"{{"exp":{exp},"iat":{NOW_SECS},"nameid":"42","email":"ops@example.com","role":["admin","owner"]}}"#))
    }

    #[test]
    fn test_decode_reads_claims() {
        let claims = decode_jwt(&token_expiring_in(60)).unwrap();
        assert_eq!(claims.exp, Some(i64::try_from(NOW_SECS).unwrap() + 60));
        assert_eq!(claims.nameid.as_deref(), Some("42"));
        assert_eq!(claims.email.as_deref(), Some("ops@example.com"));
        assert_eq!(claims.role, vec!["admin".to_string(), "owner".to_string()]);
    }

    #[test]
    fn test_decode_tolerates_padding() {
        let header = URL_SAFE_NO_PAD.encode("{}");
        let payload = base64::engine::general_purpose::URL_SAFE.encode(r#"{"exp":12}"#);
        assert!(payload.ends_with("=="));
        let claims = decode_jwt(&format!("{header}.{payload}.sig")).unwrap();
        assert_eq!(claims.exp, Some(12));
    }

    #[test]
    fn test_multi_role_token_is_not_expired() {
        let exp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 3600;
        let token = token_with_payload(&format!(r#"{{"exp":{exp},"nameid":7,"role":["Admin","Owner"]}}"#));
        let claims = decode_jwt(&token).unwrap();
        assert_eq!(claims.nameid.as_deref(), Some("7"));
        assert_eq!(claims.role.len(), 2);
        assert!(!is_token_expired(&token, DEFAULT_EXPIRY_BUFFER));
    }

    #[test]
    fn test_decode_accepts_standard_alphabet() {
        // `>>>` and `???` encode to `+` and `/` respectively in the standard alphabet.
        let payload = STANDARD_NO_PAD.encode(r#"{"exp":12,"email":">>>???"}"#);
        assert!(payload.contains('+') || payload.contains('/'));
        let claims = decode_jwt(&format!("a.{payload}.c")).unwrap();
        assert_eq!(claims.exp, Some(12));
        assert_eq!(claims.email.as_deref(), Some(">>>???"));
    }

    #[test]
    fn test_decode_malformed_returns_none() {
        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("not json"));
        let json_number = format!("a.{}.c", URL_SAFE_NO_PAD.encode("42"));
        for token in ["", "abc", "a.b", "a.b.c.d", "a.!!!.c", not_json.as_str(), json_number.as_str()] {
            assert!(decode_jwt(token).is_none(), "expected None for {token:?}");
        }
    }

    #[test]
    fn test_expiry_respects_buffer() {
        let token = token_expiring_in(60);
        assert!(!is_token_expired_at(&token, Duration::from_secs(30), now()));
        assert!(is_token_expired_at(&token, Duration::from_secs(61), now()));
    }

    #[test]
    fn test_expired_when_unusable() {
        assert!(is_token_expired_at("", DEFAULT_EXPIRY_BUFFER, now()));
        assert!(is_token_expired_at("garbage", DEFAULT_EXPIRY_BUFFER, now()));
        assert!(is_token_expired_at(&token_with_payload(r#"{"sub":"1"}"#), DEFAULT_EXPIRY_BUFFER, now()));
        assert!(is_token_expired_at(&token_expiring_in(0), Duration::ZERO, now()));
    }

    #[test]
    fn test_remaining_time_floors_at_zero() {
        assert_eq!(token_remaining_time_at(&token_expiring_in(90), now()), Duration::from_secs(90));
        assert_eq!(token_remaining_time_at(&token_expiring_in(-90), now()), Duration::ZERO);
        assert_eq!(token_remaining_time_at("garbage", now()), Duration::ZERO);
    }

    #[test]
    fn test_expiring_soon_window() {
        let window = DEFAULT_EXPIRING_SOON_WINDOW;
        assert!(!is_token_expiring_soon_at(&token_expiring_in(-5), window, now()));
        assert!(!is_token_expiring_soon_at(&token_expiring_in(0), window, now()));
        assert!(!is_token_expiring_soon_at(&token_expiring_in(600), window, now()));
        assert!(is_token_expiring_soon_at(&token_expiring_in(120), window, now()));
    }

    #[test]
    fn test_wall_clock_variants_agree() {
        let exp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 3600;
        let token = token_with_payload(&format!(r#"{{"exp":{exp}}}"#));
        assert!(!is_token_expired(&token, DEFAULT_EXPIRY_BUFFER));
        assert!(!is_token_expiring_soon(&token, DEFAULT_EXPIRING_SOON_WINDOW));
        assert!(token_remaining_time(&token) > Duration::from_secs(3500));
    }
}
