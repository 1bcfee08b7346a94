use aws_sdk_s3::primitives::ByteStream;
use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::auth::is_valid_email;
use crate::auth::password::{hash_password, MIN_PASSWORD_LEN};
use crate::errors::AppError;
use crate::models::user::{User, UserSummary};
use crate::state::AppState;

pub const MAX_PICTURE_BYTES: usize = 5 * 1024 * 1024;
const PICTURE_FIELD: &str = "profile_picture";

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PictureResponse {
    pub id: Uuid,
    pub profile_picture: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

/// Maps an accepted image content type to the file extension used in the object key.
pub fn picture_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

pub fn picture_key(user_id: Uuid, extension: &str) -> String {
    format!("avatars/{user_id}/{}.{extension}", Uuid::new_v4())
}

/// Path-style object URL, which MinIO and S3 both serve.
pub fn object_url(endpoint: &str, bucket: &str, key: &str) -> String {
    format!("{}/{bucket}/{key}", endpoint.trim_end_matches('/'))
}

/// PUT /api/users/profile
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserSummary>, AppError> {
    let username = match req.username {
        Some(u) if u.trim().is_empty() => {
            return Err(AppError::Validation("Username cannot be empty".into()))
        }
        Some(u) => Some(u.trim().to_string()),
        None => user.username.clone(),
    };
    let email = match req.email {
        Some(e) => {
            let e = e.trim().to_lowercase();
            if !is_valid_email(&e) {
                return Err(AppError::Validation("Please enter a valid email".into()));
            }
            e
        }
        None => user.email.clone(),
    };
    let password_hash = match req.password {
        Some(p) if p.len() < MIN_PASSWORD_LEN => {
            return Err(AppError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )))
        }
        Some(p) => hash_password(&p).map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?,
        None => user.password_hash.clone(),
    };

    let updated: User = sqlx::query_as(
        "UPDATE users SET username = $2, email = $3, password_hash = $4 WHERE id = $1 RETURNING *",
    )
    .bind(user.id)
    .bind(&username)
    .bind(&email)
    .bind(&password_hash)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(updated.summary()))
}

/// POST /api/users/profile/picture
pub async fn upload_picture(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<PictureResponse>, AppError> {
    let mut upload: Option<(String, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(PICTURE_FIELD) {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
        upload = Some((content_type, bytes));
        break;
    }

    let (content_type, bytes) =
        upload.ok_or_else(|| AppError::Validation("No file uploaded".into()))?;
    let extension = picture_extension(&content_type).ok_or_else(|| {
        AppError::Validation("Only JPEG, PNG, GIF and WebP images are allowed".into())
    })?;
    if bytes.is_empty() {
        return Err(AppError::Validation("No file uploaded".into()));
    }
    if bytes.len() > MAX_PICTURE_BYTES {
        return Err(AppError::Validation("Image must be 5 MB or smaller".into()));
    }

    let key = picture_key(user.id, extension);
    state
        .s3
        .put_object()
        .bucket(&state.config.s3_bucket)
        .key(&key)
        .body(ByteStream::from(bytes))
        .content_type(&content_type)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("Profile picture upload failed: {e}")))?;
    info!("Uploaded profile picture to s3://{}/{}", state.config.s3_bucket, key);

    let url = object_url(&state.config.s3_endpoint, &state.config.s3_bucket, &key);
    sqlx::query("UPDATE users SET profile_picture = $2 WHERE id = $1")
        .bind(user.id)
        .bind(&url)
        .execute(&state.db)
        .await?;

    Ok(Json(PictureResponse {
        id: user.id,
        profile_picture: url,
        message: "Profile picture updated".into(),
    }))
}

/// GET /api/users/search?query=
pub async fn search_users(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<UserSummary>>, AppError> {
    let query = params.query.unwrap_or_default();
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::Validation("Search query is required".into()));
    }

    let users: Vec<UserSummary> = sqlx::query_as(
        r#"
        SELECT id, username, email, profile_picture
        FROM users
        WHERE id <> $1
          AND (username ILIKE '%' || $2 || '%' OR email ILIKE '%' || $2 || '%')
        ORDER BY username
        LIMIT 10
        "#,
    )
    .bind(user.id)
    .bind(escape_like(query))
    .fetch_all(&state.db)
    .await?;
    Ok(Json(users))
}

/// Escapes LIKE wildcards so the query matches literally.
pub fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picture_types() {
        assert_eq!(picture_extension("image/png"), Some("png"));
        assert_eq!(picture_extension("image/jpeg"), Some("jpg"));
        assert_eq!(picture_extension("image/webp"), Some("webp"));
        assert_eq!(picture_extension("application/pdf"), None);
        assert_eq!(picture_extension(""), None);
    }

    #[test]
    fn test_picture_key_layout() {
        let user = Uuid::new_v4();
        let key = picture_key(user, "png");
        assert!(key.starts_with(&format!("avatars/{user}/")));
        assert!(key.ends_with(".png"));
    }

    #[test]
    fn test_object_url_is_path_style() {
        assert_eq!(
            object_url("http://localhost:9000/", "vitae", "avatars/a/b.png"),
            "http://localhost:9000/vitae/avatars/a/b.png"
        );
    }

    #[test]
    fn test_like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("ada"), "ada");
    }
}
