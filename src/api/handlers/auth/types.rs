//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    /// Email or username.
    pub identifier: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct IdentityResponse {
    pub user_id: String,
    pub email: String,
    pub username: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub user_id: String,
    pub email: String,
    pub username: String,
    pub expires_at: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn login_request_round_trips() -> Result<()> {
        let request = LoginRequest {
            identifier: "alice@example.com".to_string(),
            password: "hunter22!".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let identifier = value
            .get("identifier")
            .and_then(serde_json::Value::as_str)
            .context("missing identifier")?;
        assert_eq!(identifier, "alice@example.com");
        let decoded: LoginRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.password, "hunter22!");
        Ok(())
    }

    #[test]
    fn token_response_shape() -> Result<()> {
        let response = TokenResponse {
            access_token: "a.b.c".to_string(),
            token_type: "Bearer".to_string(),
            expires_at: 1_700_086_400,
        };
        let value = serde_json::to_value(&response)?;
        assert_eq!(
            value.get("token_type").and_then(serde_json::Value::as_str),
            Some("Bearer")
        );
        assert_eq!(
            value.get("expires_at").and_then(serde_json::Value::as_i64),
            Some(1_700_086_400)
        );
        Ok(())
    }

    #[test]
    fn reset_password_request_round_trips() -> Result<()> {
        let request = ResetPasswordRequest {
            token: "secret".to_string(),
            new_password: "new-password".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let decoded: ResetPasswordRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.token, "secret");
        assert_eq!(decoded.new_password, "new-password");
        Ok(())
    }
}
