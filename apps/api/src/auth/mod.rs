pub mod extractor;
pub mod handlers;
pub mod jwt;
pub mod oauth;
pub mod otp;
pub mod password;

use std::sync::LazyLock;

use chrono::Duration;
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::user::User;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Body returned by every successful sign-in path.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub id: Uuid,
    pub username: Option<String>,
    pub email: String,
    pub profile_picture: String,
    pub token: String,
}

pub fn sign_in(config: &Config, user: &User) -> Result<AuthResponse, AppError> {
    let token = jwt::issue_token(
        user.id,
        &config.jwt_secret,
        Duration::days(config.jwt_expiry_days),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    Ok(AuthResponse {
        id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        profile_picture: user.profile_picture.clone(),
        token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.org"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("ada example@x.com"));
        assert!(!is_valid_email("@example.com"));
    }
}
