//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::auth;
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        token_secret: SecretString::from(auth_opts.token_secret),
        frontend_base_url: auth_opts.frontend_base_url,
        access_token_ttl_seconds: auth_opts.access_token_ttl_seconds,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        reset_token_ttl_seconds: auth_opts.reset_token_ttl_seconds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_secret_required() {
        temp_env::with_vars(
            [
                ("TASKPASS_TOKEN_SECRET", None::<&str>),
                (
                    "TASKPASS_DSN",
                    Some("postgres://user@localhost:5432/taskpass"),
                ),
            ],
            || {
                let command = crate::cli::commands::new();
                let result = command.try_get_matches_from(vec!["taskpass"]);
                assert!(result.is_err());
            },
        );
    }

    #[test]
    fn handler_builds_server_action() {
        temp_env::with_vars(
            [
                (
                    "TASKPASS_TOKEN_SECRET",
                    Some("0123456789abcdef0123456789abcdef"),
                ),
                (
                    "TASKPASS_DSN",
                    Some("postgres://user@localhost:5432/taskpass"),
                ),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["taskpass"]);
                let action = handler(&matches).expect("handler should succeed");
                let Action::Server(args) = action;
                assert_eq!(args.port, 8080);
                assert_eq!(args.dsn, "postgres://user@localhost:5432/taskpass");
                assert_eq!(args.frontend_base_url, "https://taskpass.dev");
                assert_eq!(args.access_token_ttl_seconds, 86400);
                assert_eq!(args.session_ttl_seconds, 43200);
                assert_eq!(args.reset_token_ttl_seconds, 3600);
            },
        );
    }
}
