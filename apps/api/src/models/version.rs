use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::resume::Section;
use crate::models::user::UserSummary;

/// One immutable snapshot of a resume's sections. Rows are only ever inserted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeVersionRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub user_id: Uuid,
    pub version_number: i32,
    pub sections: Json<Vec<Section>>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionWithAuthor {
    #[serde(flatten)]
    pub version: ResumeVersionRow,
    pub author: Option<UserSummary>,
}
