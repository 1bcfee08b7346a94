use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub is_email_verified: bool,
    pub profile_picture: String,
    #[serde(skip_serializing)]
    pub otp: Option<String>,
    #[serde(skip_serializing)]
    pub otp_expiry: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub google_id: Option<String>,
    #[serde(skip_serializing)]
    pub github_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The public face of a user, embedded in resumes, comments and versions.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: Option<String>,
    pub email: String,
    pub profile_picture: String,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            profile_picture: self.profile_picture.clone(),
        }
    }

    /// Name shown to other collaborators in a room.
    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .unwrap_or_else(|| self.email.split('@').next().unwrap_or_default().to_string())
    }
}

/// Fetches user summaries for a set of ids, in no particular order.
pub async fn fetch_summaries(
    db: &sqlx::PgPool,
    ids: &[Uuid],
) -> Result<Vec<UserSummary>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, UserSummary>(
        "SELECT id, username, email, profile_picture FROM users WHERE id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(db)
    .await
}

pub async fn find_by_id(db: &sqlx::PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Inserts a verified account for database-backed tests.
#[cfg(test)]
pub(crate) async fn insert_test_user(db: &sqlx::PgPool, email: &str) -> User {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (email, password_hash, is_email_verified) VALUES ($1, 'x', TRUE) RETURNING *",
    )
    .bind(email)
    .fetch_one(db)
    .await
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            first_name: None,
            last_name: None,
            username: username.map(str::to_string),
            email: "ada@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: "user".to_string(),
            is_email_verified: true,
            profile_picture: String::new(),
            otp: Some("123456".to_string()),
            otp_expiry: None,
            google_id: None,
            github_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_serialized_user_never_leaks_secrets() {
        let json = serde_json::to_value(user(Some("ada"))).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("otp").is_none());
        assert_eq!(json["username"], "ada");
    }

    #[test]
    fn test_display_name_falls_back_to_email_local_part() {
        assert_eq!(user(None).display_name(), "ada");
        assert_eq!(user(Some("lovelace")).display_name(), "lovelace");
    }
}
