//! Rate limiting primitives for auth flows.
//!
//! Budgets are enforced over a rolling window per key. Keys combine the
//! action with a client IP or account identifier, so one caller cannot burn
//! another caller's budget.

use anyhow::Result;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::error::AuthError;
use super::utils::unix_now;

#[derive(Clone, Copy, Debug)]
pub enum RateLimitAction {
    Signup,
    Login,
    ForgotPassword,
    ResetPassword,
    ChangePassword,
}

impl RateLimitAction {
    pub(super) const fn as_str(self) -> &'static str {
        match self {
            Self::Signup => "signup",
            Self::Login => "login",
            Self::ForgotPassword => "forgot-password",
            Self::ResetPassword => "reset-password",
            Self::ChangePassword => "change-password",
        }
    }

    pub(super) const fn max_attempts(self) -> usize {
        match self {
            Self::Signup | Self::Login => 10,
            Self::ForgotPassword | Self::ResetPassword => 5,
            Self::ChangePassword => 3,
        }
    }

    pub(super) const fn window_seconds(self) -> i64 {
        match self {
            Self::Signup => 3600,
            Self::Login => 300,
            Self::ForgotPassword | Self::ResetPassword | Self::ChangePassword => 1800,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: usize },
    Denied { reset_at: i64 },
}

pub trait RateLimiter: Send + Sync {
    /// Record an attempt under `key` and decide whether it is within budget.
    ///
    /// # Errors
    /// Returns an error if the current time cannot be determined.
    fn check_and_record(&self, key: &str, action: RateLimitAction) -> Result<RateLimitDecision>;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_and_record(&self, _key: &str, action: RateLimitAction) -> Result<RateLimitDecision> {
        Ok(RateLimitDecision::Allowed {
            remaining: action.max_attempts(),
        })
    }
}

/// In-process rolling-window limiter.
///
/// Attempt timestamps are kept per key and pruned lazily on the next check
/// for the same key. State is not shared across replicas.
#[derive(Debug, Default)]
pub struct WindowRateLimiter {
    windows: Mutex<HashMap<String, VecDeque<i64>>>,
}

impl WindowRateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn check_and_record_at(
        &self,
        key: &str,
        max_attempts: usize,
        window_seconds: i64,
        now: i64,
    ) -> RateLimitDecision {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let attempts = windows.entry(key.to_string()).or_default();

        // Drop attempts that fell out of the window.
        while attempts
            .front()
            .is_some_and(|&first| first + window_seconds <= now)
        {
            attempts.pop_front();
        }

        if attempts.len() >= max_attempts {
            // Oldest attempt in the window decides when the budget frees up.
            let reset_at = attempts
                .front()
                .map_or(now + window_seconds, |&first| first + window_seconds);
            return RateLimitDecision::Denied { reset_at };
        }

        attempts.push_back(now);
        RateLimitDecision::Allowed {
            remaining: max_attempts - attempts.len(),
        }
    }
}

impl RateLimiter for WindowRateLimiter {
    fn check_and_record(&self, key: &str, action: RateLimitAction) -> Result<RateLimitDecision> {
        let now = unix_now()?;
        Ok(self.check_and_record_at(key, action.max_attempts(), action.window_seconds(), now))
    }
}

/// Check one rate limit key and convert a denial into the 429 error.
pub(super) fn enforce(
    limiter: &dyn RateLimiter,
    key: &str,
    action: RateLimitAction,
) -> Result<(), AuthError> {
    match limiter.check_and_record(key, action)? {
        RateLimitDecision::Allowed { .. } => Ok(()),
        RateLimitDecision::Denied { reset_at } => Err(AuthError::RateLimited { reset_at }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn noop_rate_limiter_allows() {
        let limiter = NoopRateLimiter;
        let decision = limiter
            .check_and_record("login:ip:10.0.0.1", RateLimitAction::Login)
            .unwrap();
        assert!(matches!(decision, RateLimitDecision::Allowed { .. }));
    }

    #[test]
    fn denies_after_budget_is_spent() {
        let limiter = WindowRateLimiter::new();

        for attempt in 0..3 {
            let decision = limiter.check_and_record_at("key", 3, 1800, NOW + attempt);
            assert!(
                matches!(decision, RateLimitDecision::Allowed { .. }),
                "attempt {attempt} should be allowed"
            );
        }

        let decision = limiter.check_and_record_at("key", 3, 1800, NOW + 3);
        assert_eq!(decision, RateLimitDecision::Denied { reset_at: NOW + 1800 });
    }

    #[test]
    fn remaining_counts_down() {
        let limiter = WindowRateLimiter::new();
        assert_eq!(
            limiter.check_and_record_at("key", 3, 1800, NOW),
            RateLimitDecision::Allowed { remaining: 2 }
        );
        assert_eq!(
            limiter.check_and_record_at("key", 3, 1800, NOW),
            RateLimitDecision::Allowed { remaining: 1 }
        );
        assert_eq!(
            limiter.check_and_record_at("key", 3, 1800, NOW),
            RateLimitDecision::Allowed { remaining: 0 }
        );
    }

    #[test]
    fn budget_recovers_as_attempts_age_out() {
        let limiter = WindowRateLimiter::new();

        limiter.check_and_record_at("key", 2, 300, NOW);
        limiter.check_and_record_at("key", 2, 300, NOW + 100);
        assert!(matches!(
            limiter.check_and_record_at("key", 2, 300, NOW + 200),
            RateLimitDecision::Denied { reset_at } if reset_at == NOW + 300
        ));

        // First attempt ages out exactly at NOW + 300.
        assert!(matches!(
            limiter.check_and_record_at("key", 2, 300, NOW + 300),
            RateLimitDecision::Allowed { .. }
        ));
    }

    #[test]
    fn keys_are_isolated() {
        let limiter = WindowRateLimiter::new();

        limiter.check_and_record_at("login:ip:10.0.0.1", 1, 300, NOW);
        assert!(matches!(
            limiter.check_and_record_at("login:ip:10.0.0.1", 1, 300, NOW),
            RateLimitDecision::Denied { .. }
        ));
        assert!(matches!(
            limiter.check_and_record_at("login:ip:10.0.0.2", 1, 300, NOW),
            RateLimitDecision::Allowed { .. }
        ));
    }

    #[test]
    fn action_budgets() {
        assert_eq!(RateLimitAction::Login.max_attempts(), 10);
        assert_eq!(RateLimitAction::Login.window_seconds(), 300);
        assert_eq!(RateLimitAction::Signup.max_attempts(), 10);
        assert_eq!(RateLimitAction::Signup.window_seconds(), 3600);
        assert_eq!(RateLimitAction::ForgotPassword.max_attempts(), 5);
        assert_eq!(RateLimitAction::ResetPassword.window_seconds(), 1800);
        assert_eq!(RateLimitAction::ChangePassword.max_attempts(), 3);
    }

    #[test]
    fn enforce_maps_denial_to_rate_limited() {
        let limiter = WindowRateLimiter::new();
        let key = "change-password:user:42";

        for _ in 0..3 {
            assert!(enforce(&limiter, key, RateLimitAction::ChangePassword).is_ok());
        }

        let err = enforce(&limiter, key, RateLimitAction::ChangePassword).unwrap_err();
        assert!(matches!(err, AuthError::RateLimited { .. }));
    }
}
