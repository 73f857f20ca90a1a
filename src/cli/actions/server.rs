use crate::api;
use anyhow::Result;
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub token_secret: SecretString,
    pub frontend_base_url: String,
    pub access_token_ttl_seconds: i64,
    pub session_ttl_seconds: i64,
    pub reset_token_ttl_seconds: i64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database pool or the listener cannot be set up.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config =
        api::handlers::auth::AuthConfig::new(args.frontend_base_url, args.token_secret)
            .with_access_token_ttl_seconds(args.access_token_ttl_seconds)
            .with_session_ttl_seconds(args.session_ttl_seconds)
            .with_reset_token_ttl_seconds(args.reset_token_ttl_seconds);

    api::new(args.port, &args.dsn, auth_config).await
}
