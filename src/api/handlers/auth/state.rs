//! Auth state and configuration.

use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use super::password::hash_password;
use super::rate_limit::RateLimiter;
use super::utils::generate_reset_secret;

const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;
const DEFAULT_RESET_TOKEN_TTL_SECONDS: i64 = 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    token_secret: SecretString,
    access_token_ttl_seconds: i64,
    session_ttl_seconds: i64,
    reset_token_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String, token_secret: SecretString) -> Self {
        Self {
            frontend_base_url,
            token_secret,
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            reset_token_ttl_seconds: DEFAULT_RESET_TOKEN_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reset_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_token_ttl_seconds = seconds;
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(super) fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    pub(super) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(super) fn reset_token_ttl_seconds(&self) -> i64 {
        self.reset_token_ttl_seconds
    }

    pub(super) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }

    pub(super) fn signing_secret(&self) -> &[u8] {
        self.token_secret.expose_secret().as_bytes()
    }
}

pub struct AuthState {
    config: AuthConfig,
    rate_limiter: Arc<dyn RateLimiter>,
    /// Hash of a throwaway password, verified for unknown identifiers so a
    /// login against a missing account costs the same as a wrong password.
    dummy_password_hash: String,
}

impl AuthState {
    /// Build the shared auth state.
    ///
    /// # Errors
    /// Returns an error if the dummy hash cannot be computed.
    pub fn new(config: AuthConfig, rate_limiter: Arc<dyn RateLimiter>) -> Result<Self> {
        let dummy_password_hash = hash_password(&generate_reset_secret()?)?;
        Ok(Self {
            config,
            rate_limiter,
            dummy_password_hash,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(super) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }

    pub(super) fn dummy_password_hash(&self) -> &str {
        &self.dummy_password_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::rate_limit::NoopRateLimiter;

    fn config() -> AuthConfig {
        AuthConfig::new(
            "https://taskpass.dev".to_string(),
            SecretString::from("0123456789abcdef0123456789abcdef"),
        )
    }

    #[test]
    fn defaults_and_builders() {
        let config = config()
            .with_access_token_ttl_seconds(60)
            .with_session_ttl_seconds(120)
            .with_reset_token_ttl_seconds(30);

        assert_eq!(config.access_token_ttl_seconds(), 60);
        assert_eq!(config.session_ttl_seconds(), 120);
        assert_eq!(config.reset_token_ttl_seconds(), 30);
        assert_eq!(config.frontend_base_url(), "https://taskpass.dev");
        assert!(config.session_cookie_secure());

        let plain = AuthConfig::new(
            "http://localhost:5173".to_string(),
            SecretString::from("secret"),
        );
        assert_eq!(plain.access_token_ttl_seconds(), 86_400);
        assert_eq!(plain.session_ttl_seconds(), 43_200);
        assert_eq!(plain.reset_token_ttl_seconds(), 3_600);
        assert!(!plain.session_cookie_secure());
    }

    #[test]
    fn debug_redacts_token_secret() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("0123456789abcdef"));
    }

    #[test]
    fn dummy_hash_is_a_valid_phc_string() {
        let state = AuthState::new(config(), Arc::new(NoopRateLimiter)).unwrap();
        assert!(state.dummy_password_hash().starts_with("$argon2id$"));
    }
}
