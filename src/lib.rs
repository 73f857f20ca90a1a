//! # Taskpass (authentication & session service)
//!
//! `taskpass` is the authentication authority for the Taskpass task manager.
//! It handles signup, login, bearer access tokens, server-side sessions, and
//! the password-reset lifecycle. Task and category handlers live in their own
//! services and consume the identity this service proves.
//!
//! ## Access tokens
//!
//! Access tokens are self-contained HS256 tokens (three dot-separated
//! URL-safe base64 segments) signed with a server-side secret. They are
//! verified offline: signature plus expiry, then a re-check that the subject
//! is still an active user.
//!
//! > **Limitation:** there is no revocation list. A minted access token stays
//! > valid until its expiry claim even after logout; logout only removes the
//! > server-side session record.
//!
//! ## Passwords & reset flow
//!
//! Passwords are stored as Argon2id PHC strings and never logged. Password
//! reset issues a single-use, one-hour secret per user; requesting a new one
//! overwrites the old. Only a SHA-256 hash of the secret touches the
//! database; the raw secret leaves the service through the email outbox.
//!
//! ## Rate limiting
//!
//! Sensitive endpoints (login, signup, password change, reset) are limited
//! per rolling window with per-action budgets, tighter for higher-risk
//! actions. Denials return `429` with a `reset_time` the caller may retry
//! after.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
