//! Auth handlers and supporting modules.
//!
//! This module coordinates registration, password login, bearer access
//! tokens, server-side sessions, and the password reset lifecycle.
//!
//! ## Rate limiting
//!
//! Sensitive endpoints are budgeted per rolling window, keyed by client IP
//! and by the targeted identifier so neither can be brute-forced through the
//! other:
//!
//! - **Login:** 10 attempts per 5 minutes.
//! - **Signup:** 10 attempts per hour.
//! - **Forgot/reset password:** 5 attempts per 30 minutes.
//! - **Change password:** 3 attempts per 30 minutes.
//!
//! ## Token secret
//!
//! Access tokens are HS256-signed with a single shared secret. All instances
//! must share the secret; rotating it invalidates every outstanding token.

mod error;
pub(crate) mod login;
mod password;
pub(crate) mod password_change;
mod principal;
mod rate_limit;
pub(crate) mod register;
pub(crate) mod reset;
pub(crate) mod session;
mod state;
mod storage;
mod token;
pub(crate) mod types;
mod utils;
pub(crate) mod verify;

pub use error::ErrorBody;
pub use rate_limit::{NoopRateLimiter, RateLimiter, WindowRateLimiter};
pub use state::{AuthConfig, AuthState};
#[cfg(test)]
pub(crate) use utils::{generate_session_token, hash_session_token};
