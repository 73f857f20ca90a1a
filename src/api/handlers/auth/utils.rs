//! Small helpers for auth validation, token generation, and hashing.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Normalize an email for lookup/uniqueness checks.
pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(super) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Normalize a username the same way the email is normalized.
pub(super) fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Usernames are 3-32 chars, lowercase alphanumeric plus `-` and `_`,
/// starting with an alphanumeric.
pub(super) fn valid_username(username_normalized: &str) -> bool {
    Regex::new(r"^[a-z0-9][a-z0-9_-]{2,31}$")
        .is_ok_and(|regex| regex.is_match(username_normalized))
}

/// Passwords are free-form but bounded: 8 to 128 characters.
pub(super) fn valid_password(password: &str) -> bool {
    let len = password.chars().count();
    (8..=128).contains(&len)
}

/// Create a new session token for the auth cookie.
/// The raw value is only returned to set the cookie; the database stores a hash.
pub(crate) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Create a new password reset secret for the email link.
/// Returned secret is only sent to the user; we store a hash in the database.
pub(super) fn generate_reset_secret() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate reset secret")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a session token so raw values never touch the database.
/// The hash is used for lookups when the cookie is presented.
pub(crate) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Hash a reset secret so we never store the raw secret in the database.
pub(super) fn hash_reset_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

/// Build the frontend reset link included in outbound emails.
pub(super) fn build_reset_url(frontend_base_url: &str, secret: &str) -> String {
    let base = frontend_base_url.trim_end_matches('/');
    format!("{base}/reset-password?token={secret}")
}

/// Extract a bearer token from the `Authorization` header.
pub(super) fn extract_bearer_token(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Extract a client IP for rate limiting from common proxy headers.
pub(super) fn extract_client_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Extract the client user agent, truncated so oversized headers never hit the database.
pub(super) fn extract_user_agent(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.chars().take(255).collect::<String>())
        .filter(|value| !value.is_empty())
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Current unix time in seconds.
///
/// # Errors
/// Returns an error if the system clock is before the unix epoch.
pub(crate) fn unix_now() -> Result<i64> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before unix epoch")?;
    i64::try_from(now.as_secs()).context("unix time overflows i64")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_bad_format() {
        assert!(!valid_email("a@example"));
        assert!(!valid_email("a example.com"));
        assert!(!valid_email("@example.com"));
    }

    #[test]
    fn valid_username_accepts_expected_shapes() {
        assert!(valid_username("alice"));
        assert!(valid_username("alice-42"));
        assert!(valid_username("a1_b2"));
    }

    #[test]
    fn valid_username_rejects_bad_shapes() {
        assert!(!valid_username("al"));
        assert!(!valid_username("-alice"));
        assert!(!valid_username("Alice"));
        assert!(!valid_username("way-too-long-username-that-goes-over-32"));
        assert!(!valid_username("has space"));
    }

    #[test]
    fn valid_password_bounds() {
        assert!(!valid_password("short7!"));
        assert!(valid_password("eight-ch"));
        assert!(valid_password(&"x".repeat(128)));
        assert!(!valid_password(&"x".repeat(129)));
    }

    #[test]
    fn session_token_is_url_safe_and_unique() {
        let token = generate_session_token().unwrap();
        let other = generate_session_token().unwrap();
        assert_ne!(token, other);
        assert!(Base64UrlUnpadded::decode_vec(&token).is_ok());
        assert_eq!(Base64UrlUnpadded::decode_vec(&token).unwrap().len(), 32);
    }

    #[test]
    fn reset_secret_hash_is_sha256() {
        let secret = generate_reset_secret().unwrap();
        let hash = hash_reset_secret(&secret);
        assert_eq!(hash.len(), 32);
        assert_ne!(hash, secret.as_bytes());
        assert_eq!(hash, hash_reset_secret(&secret));
    }

    #[test]
    fn build_reset_url_handles_trailing_slash() {
        assert_eq!(
            build_reset_url("https://taskpass.dev/", "abc"),
            "https://taskpass.dev/reset-password?token=abc"
        );
        assert_eq!(
            build_reset_url("https://taskpass.dev", "abc"),
            "https://taskpass.dev/reset-password?token=abc"
        );
    }

    #[test]
    fn extract_bearer_token_parses_authorization_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(
            extract_bearer_token(&headers),
            Some("abc.def.ghi".to_string())
        );

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer "),
        );
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn extract_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers), None);

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(extract_client_ip(&headers), Some("10.0.0.2".to_string()));

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(extract_client_ip(&headers), Some("203.0.113.7".to_string()));
    }

    #[test]
    fn extract_user_agent_truncates() {
        let mut headers = HeaderMap::new();
        let long = "u".repeat(300);
        headers.insert(
            axum::http::header::USER_AGENT,
            HeaderValue::from_str(&long).unwrap(),
        );
        let agent = extract_user_agent(&headers).unwrap();
        assert_eq!(agent.len(), 255);
    }

    #[test]
    fn unix_now_is_recent() {
        let now = unix_now().unwrap();
        // 2023-01-01 as a sanity floor
        assert!(now > 1_672_531_200);
    }
}
