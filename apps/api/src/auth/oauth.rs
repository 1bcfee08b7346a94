//! Google and GitHub sign-in via the authorization-code flow.
//!
//! `GET /api/auth/{provider}` redirects to the provider; the callback exchanges
//! the code, resolves or creates the local user and redirects back to the
//! client with a bearer token in the query string.

use axum::extract::{Query, State};
use axum::response::Redirect;
use rand::Rng;
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::password::{hash_password, random_password};
use crate::auth::sign_in;
use crate::config::{Config, OAuthAppConfig};
use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_USER_URL: &str = "https://api.github.com/user";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Google,
    Github,
}

impl Provider {
    pub fn slug(self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Github => "github",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Provider::Google => "Google",
            Provider::Github => "GitHub",
        }
    }

    fn id_column(self) -> &'static str {
        match self {
            Provider::Google => "google_id",
            Provider::Github => "github_id",
        }
    }

    fn app(self, config: &Config) -> Result<&OAuthAppConfig, AppError> {
        let app = match self {
            Provider::Google => config.google.as_ref(),
            Provider::Github => config.github.as_ref(),
        };
        app.ok_or_else(|| {
            AppError::ServiceUnavailable(format!("{} sign-in is not configured", self.label()))
        })
    }

    pub fn redirect_uri(self, config: &Config) -> String {
        format!(
            "{}/api/auth/{}/callback",
            config.server_url.trim_end_matches('/'),
            self.slug()
        )
    }

    pub fn authorize_url(self, app: &OAuthAppConfig, redirect_uri: &str) -> String {
        let (base, scope) = match self {
            Provider::Google => (GOOGLE_AUTHORIZE_URL, "openid email profile"),
            Provider::Github => (GITHUB_AUTHORIZE_URL, "user:email"),
        };
        format!(
            "{base}?client_id={}&redirect_uri={}&response_type=code&scope={}",
            urlencoding::encode(&app.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(scope),
        )
    }
}

/// Where the browser lands after a successful sign-in.
pub fn success_redirect(config: &Config, provider: Provider, token: &str) -> String {
    format!(
        "{}/oauth/callback?provider={}&token={}",
        config.client_url.trim_end_matches('/'),
        provider.slug(),
        urlencoding::encode(token)
    )
}

pub fn failure_redirect(config: &Config, provider: Provider) -> String {
    format!(
        "{}/login?error={}",
        config.client_url.trim_end_matches('/'),
        urlencoding::encode(&format!("{} OAuth failed", provider.label()))
    )
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: String,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

/// Provider-neutral view of the signed-in account.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthProfile {
    pub provider_id: String,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub picture: Option<String>,
}

fn google_profile(info: GoogleUserInfo) -> OAuthProfile {
    let username = info.email.split('@').next().unwrap_or_default().to_string();
    OAuthProfile {
        provider_id: info.sub,
        email: info.email.to_lowercase(),
        username,
        first_name: info.given_name,
        last_name: info.family_name,
        picture: info.picture,
    }
}

fn github_profile(user: GithubUser) -> OAuthProfile {
    let email = user
        .email
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| format!("{}@github.com", user.login))
        .to_lowercase();
    let (first_name, last_name) = match user.name.as_deref().map(str::trim) {
        Some(full) if !full.is_empty() => match full.split_once(' ') {
            Some((first, last)) => (Some(first.to_string()), Some(last.trim().to_string())),
            None => (Some(full.to_string()), None),
        },
        _ => (None, None),
    };
    OAuthProfile {
        provider_id: user.id.to_string(),
        email,
        username: user.login,
        first_name,
        last_name,
        picture: user.avatar_url,
    }
}

async fn exchange_code(
    state: &AppState,
    provider: Provider,
    app: &OAuthAppConfig,
    code: &str,
) -> Result<OAuthProfile, anyhow::Error> {
    let redirect_uri = provider.redirect_uri(&state.config);
    let form = [
        ("client_id", app.client_id.as_str()),
        ("client_secret", app.client_secret.as_str()),
        ("code", code),
        ("redirect_uri", redirect_uri.as_str()),
        ("grant_type", "authorization_code"),
    ];

    match provider {
        Provider::Google => {
            let token: TokenResponse = state
                .http
                .post(GOOGLE_TOKEN_URL)
                .form(&form)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            let info: GoogleUserInfo = state
                .http
                .get(GOOGLE_USERINFO_URL)
                .bearer_auth(&token.access_token)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok(google_profile(info))
        }
        Provider::Github => {
            let token: TokenResponse = state
                .http
                .post(GITHUB_TOKEN_URL)
                .header("accept", "application/json")
                .form(&form)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            let user: GithubUser = state
                .http
                .get(GITHUB_USER_URL)
                .bearer_auth(&token.access_token)
                .header("user-agent", "vitae-api")
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok(github_profile(user))
        }
    }
}

/// Links the provider id to an existing account (by email or provider id) or
/// creates a verified account for a first-time visitor.
async fn find_or_create_user(
    state: &AppState,
    provider: Provider,
    profile: &OAuthProfile,
) -> Result<User, AppError> {
    let column = provider.id_column();
    let existing: Option<User> = sqlx::query_as(&format!(
        "SELECT * FROM users WHERE email = $1 OR {column} = $2 LIMIT 1"
    ))
    .bind(&profile.email)
    .bind(&profile.provider_id)
    .fetch_optional(&state.db)
    .await?;

    if let Some(user) = existing {
        let user: User = sqlx::query_as(&format!(
            r#"
            UPDATE users
            SET {column} = $2,
                is_email_verified = TRUE,
                profile_picture = CASE WHEN profile_picture = '' THEN $3 ELSE profile_picture END
            WHERE id = $1
            RETURNING *
            "#
        ))
        .bind(user.id)
        .bind(&profile.provider_id)
        .bind(profile.picture.clone().unwrap_or_default())
        .fetch_one(&state.db)
        .await?;
        return Ok(user);
    }

    let taken: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)")
        .bind(&profile.username)
        .fetch_one(&state.db)
        .await?;
    let username = if taken {
        format!(
            "{}-{}",
            profile.username,
            rand::thread_rng().gen_range(1000..10000)
        )
    } else {
        profile.username.clone()
    };

    let password_hash =
        hash_password(&random_password()).map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    let user: User = sqlx::query_as(&format!(
        r#"
        INSERT INTO users
            (first_name, last_name, username, email, password_hash,
             is_email_verified, profile_picture, {column})
        VALUES ($1, $2, $3, $4, $5, TRUE, $6, $7)
        RETURNING *
        "#
    ))
    .bind(&profile.first_name)
    .bind(&profile.last_name)
    .bind(&username)
    .bind(&profile.email)
    .bind(&password_hash)
    .bind(profile.picture.clone().unwrap_or_default())
    .bind(&profile.provider_id)
    .fetch_one(&state.db)
    .await?;

    info!(user_id = %user.id, provider = provider.slug(), "User created via OAuth");
    Ok(user)
}

async fn start(state: &AppState, provider: Provider) -> Result<Redirect, AppError> {
    let app = provider.app(&state.config)?;
    let redirect_uri = provider.redirect_uri(&state.config);
    Ok(Redirect::to(&provider.authorize_url(app, &redirect_uri)))
}

async fn finish(
    state: &AppState,
    provider: Provider,
    query: CallbackQuery,
) -> Result<Redirect, AppError> {
    let app = provider.app(&state.config)?;

    let outcome = async {
        if let Some(err) = query.error {
            return Err(AppError::Unauthorized(format!("provider returned {err}")));
        }
        let code = query
            .code
            .ok_or_else(|| AppError::Validation("Missing authorization code".into()))?;
        let profile = exchange_code(state, provider, app, &code).await?;
        let user = find_or_create_user(state, provider, &profile).await?;
        sign_in(&state.config, &user)
    }
    .await;

    match outcome {
        Ok(auth) => Ok(Redirect::to(&success_redirect(
            &state.config,
            provider,
            &auth.token,
        ))),
        Err(e) => {
            warn!(provider = provider.slug(), "OAuth sign-in failed: {e}");
            Ok(Redirect::to(&failure_redirect(&state.config, provider)))
        }
    }
}

/// GET /api/auth/google
pub async fn google_login(State(state): State<AppState>) -> Result<Redirect, AppError> {
    start(&state, Provider::Google).await
}

/// GET /api/auth/google/callback
pub async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect, AppError> {
    finish(&state, Provider::Google, query).await
}

/// GET /api/auth/github
pub async fn github_login(State(state): State<AppState>) -> Result<Redirect, AppError> {
    start(&state, Provider::Github).await
}

/// GET /api/auth/github/callback
pub async fn github_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect, AppError> {
    finish(&state, Provider::Github, query).await
}
