use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::auth::otp::{generate_otp, otp_expiry, otp_matches};
use crate::auth::password::{hash_password, verify_password, MIN_PASSWORD_LEN};
use crate::auth::{is_valid_email, sign_in, AuthResponse};
use crate::errors::AppError;
use crate::models::user::{self, User};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub user_id: Uuid,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendOtpRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Normalises and checks registration input. Returns the lower-cased email.
pub fn validate_registration(req: &RegisterRequest) -> Result<String, AppError> {
    if req.username.trim().is_empty() {
        return Err(AppError::Validation("Username is required".into()));
    }
    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::Validation("Please enter a valid email".into()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(email)
}

/// Stores a fresh OTP for the user and mails it.
async fn issue_otp(state: &AppState, user: &User) -> Result<(), AppError> {
    let code = generate_otp();
    sqlx::query("UPDATE users SET otp = $1, otp_expiry = $2 WHERE id = $3")
        .bind(&code)
        .bind(otp_expiry(Utc::now()))
        .bind(user.id)
        .execute(&state.db)
        .await?;
    state
        .mailer
        .send_otp(&user.email, &code)
        .await
        .map_err(|e| AppError::Mail(e.to_string()))
}

async fn load_unverified(state: &AppState, user_id: Uuid) -> Result<User, AppError> {
    let user = user::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    if user.is_email_verified {
        return Err(AppError::Validation("Email already verified".into()));
    }
    Ok(user)
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let email = validate_registration(&req)?;
    let username = req.username.trim().to_string();

    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 OR username = $2)",
    )
    .bind(&email)
    .bind(&username)
    .fetch_one(&state.db)
    .await?;
    if exists {
        return Err(AppError::Validation(
            "User already exists with that email or username".into(),
        ));
    }

    let password_hash =
        hash_password(&req.password).map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    let user: User = sqlx::query_as(
        r#"
        INSERT INTO users (first_name, last_name, username, email, password_hash)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(&req.first_name)
    .bind(&req.last_name)
    .bind(&username)
    .bind(&email)
    .bind(&password_hash)
    .fetch_one(&state.db)
    .await?;

    if let Err(e) = issue_otp(&state, &user).await {
        error!(user_id = %user.id, "Verification email failed, rolling back registration");
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user.id)
            .execute(&state.db)
            .await?;
        return Err(e);
    }

    info!(user_id = %user.id, "User registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful. Please verify your email with the code we sent."
                .into(),
            user_id: user.id,
        }),
    ))
}

/// POST /api/auth/verify-email
pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = load_unverified(&state, req.user_id).await?;
    if !otp_matches(user.otp.as_deref(), user.otp_expiry, &req.otp, Utc::now()) {
        return Err(AppError::Validation("Invalid or expired OTP".into()));
    }

    let user: User = sqlx::query_as(
        r#"
        UPDATE users
        SET is_email_verified = TRUE, otp = NULL, otp_expiry = NULL
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user.id)
    .fetch_one(&state.db)
    .await?;

    info!(user_id = %user.id, "Email verified");
    Ok(Json(sign_in(&state.config, &user)?))
}

/// POST /api/auth/resend-otp
pub async fn resend_otp(
    State(state): State<AppState>,
    Json(req): Json<ResendOtpRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = load_unverified(&state, req.user_id).await?;
    issue_otp(&state, &user).await?;
    Ok(Json(MessageResponse {
        message: "A new verification code has been sent".into(),
    }))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = req.email.trim().to_lowercase();
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;

    let user = user
        .filter(|u| verify_password(&req.password, &u.password_hash))
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".into()))?;

    if !user.is_email_verified {
        issue_otp(&state, &user).await?;
        return Err(AppError::EmailNotVerified { user_id: user.id });
    }

    Ok(Json(sign_in(&state.config, &user)?))
}

/// GET /api/auth/me
pub async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            first_name: None,
            last_name: None,
        }
    }

    #[test]
    fn test_registration_lowercases_email() {
        let email = validate_registration(&request("ada", " Ada@Example.COM ", "secret1")).unwrap();
        assert_eq!(email, "ada@example.com");
    }

    #[test]
    fn test_registration_rejects_bad_input() {
        assert!(matches!(
            validate_registration(&request("", "ada@example.com", "secret1")),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_registration(&request("ada", "not-an-email", "secret1")),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_registration(&request("ada", "ada@example.com", "short")),
            Err(AppError::Validation(_))
        ));
    }
}
