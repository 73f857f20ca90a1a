use anyhow::{Context, Result};
use clap::{Arg, Command};

pub const ARG_TOKEN_SECRET: &str = "token-secret";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_ACCESS_TOKEN_TTL_SECONDS: &str = "access-token-ttl-seconds";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_RESET_TOKEN_TTL_SECONDS: &str = "reset-token-ttl-seconds";

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long(ARG_TOKEN_SECRET)
                .help("Secret used to sign and verify access tokens")
                .env("TASKPASS_TOKEN_SECRET")
                .required(true),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL used for password reset links and CORS")
                .env("TASKPASS_FRONTEND_BASE_URL")
                .default_value("https://taskpass.dev"),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .long(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .help("Access token TTL in seconds")
                .env("TASKPASS_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("TASKPASS_SESSION_TTL_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_RESET_TOKEN_TTL_SECONDS)
                .long(ARG_RESET_TOKEN_TTL_SECONDS)
                .help("Password reset token TTL in seconds")
                .env("TASKPASS_RESET_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub token_secret: String,
    pub frontend_base_url: String,
    pub access_token_ttl_seconds: i64,
    pub session_ttl_seconds: i64,
    pub reset_token_ttl_seconds: i64,
}

impl Options {
    /// Extract auth options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let token_secret = matches
            .get_one::<String>(ARG_TOKEN_SECRET)
            .cloned()
            .context("missing required argument: --token-secret")?;

        let frontend_base_url = matches
            .get_one::<String>(ARG_FRONTEND_BASE_URL)
            .cloned()
            .context("missing required argument: --frontend-base-url")?;

        let access_token_ttl_seconds = matches
            .get_one::<i64>(ARG_ACCESS_TOKEN_TTL_SECONDS)
            .copied()
            .unwrap_or(86400);

        let session_ttl_seconds = matches
            .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
            .copied()
            .unwrap_or(43200);

        let reset_token_ttl_seconds = matches
            .get_one::<i64>(ARG_RESET_TOKEN_TTL_SECONDS)
            .copied()
            .unwrap_or(3600);

        Ok(Self {
            token_secret,
            frontend_base_url,
            access_token_ttl_seconds,
            session_ttl_seconds,
            reset_token_ttl_seconds,
        })
    }
}
