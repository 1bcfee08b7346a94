use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::types::Json as SqlJson;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::errors::AppError;
use crate::models::resume::Section;
use crate::models::user::fetch_summaries;
use crate::models::version::{ResumeVersionRow, VersionWithAuthor};
use crate::resumes::access::{load_editable, load_viewable};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateVersionRequest {
    pub sections: Vec<Section>,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct RestoreResponse {
    pub message: String,
    pub version: ResumeVersionRow,
}

pub fn restore_description(version_number: i32) -> String {
    format!("Restored from version {version_number}")
}

/// Appends a snapshot, numbering it one past the resume's current maximum.
pub async fn append_version<'e>(
    db: impl PgExecutor<'e>,
    resume_id: Uuid,
    user_id: Uuid,
    sections: &[Section],
    description: &str,
) -> Result<ResumeVersionRow, AppError> {
    let version = sqlx::query_as::<_, ResumeVersionRow>(
        r#"
        INSERT INTO resume_versions (resume_id, user_id, version_number, sections, description)
        SELECT $1, $2, COALESCE(MAX(version_number), 0) + 1, $3, $4
        FROM resume_versions
        WHERE resume_id = $1
        RETURNING *
        "#,
    )
    .bind(resume_id)
    .bind(user_id)
    .bind(SqlJson(sections))
    .bind(description)
    .fetch_one(db)
    .await?;
    Ok(version)
}

async fn find_version(
    db: &sqlx::PgPool,
    resume_id: Uuid,
    version_number: i32,
) -> Result<ResumeVersionRow, AppError> {
    sqlx::query_as::<_, ResumeVersionRow>(
        "SELECT * FROM resume_versions WHERE resume_id = $1 AND version_number = $2",
    )
    .bind(resume_id)
    .bind(version_number)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::NotFound("Version not found".into()))
}

/// POST /api/resumes/:id/versions
pub async fn create_version(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(resume_id): Path<Uuid>,
    Json(req): Json<CreateVersionRequest>,
) -> Result<(StatusCode, Json<ResumeVersionRow>), AppError> {
    if req.description.trim().is_empty() {
        return Err(AppError::Validation("Version description is required".into()));
    }
    let resume = load_editable(&state.db, resume_id, user.id).await?;
    let version = append_version(
        &state.db,
        resume.id,
        user.id,
        &req.sections,
        req.description.trim(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(version)))
}

/// GET /api/resumes/:id/versions
pub async fn list_versions(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(resume_id): Path<Uuid>,
) -> Result<Json<Vec<VersionWithAuthor>>, AppError> {
    let resume = load_viewable(&state.db, resume_id, user.id).await?;
    let versions: Vec<ResumeVersionRow> = sqlx::query_as(
        "SELECT * FROM resume_versions WHERE resume_id = $1 ORDER BY version_number DESC",
    )
    .bind(resume.id)
    .fetch_all(&state.db)
    .await?;

    let mut author_ids: Vec<Uuid> = versions.iter().map(|v| v.user_id).collect();
    author_ids.sort();
    author_ids.dedup();
    let authors = fetch_summaries(&state.db, &author_ids).await?;

    let versions = versions
        .into_iter()
        .map(|version| {
            let author = authors.iter().find(|a| a.id == version.user_id).cloned();
            VersionWithAuthor { version, author }
        })
        .collect();
    Ok(Json(versions))
}

/// GET /api/resumes/:id/versions/:version_number
pub async fn get_version(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((resume_id, version_number)): Path<(Uuid, i32)>,
) -> Result<Json<ResumeVersionRow>, AppError> {
    let resume = load_viewable(&state.db, resume_id, user.id).await?;
    Ok(Json(find_version(&state.db, resume.id, version_number).await?))
}

/// POST /api/resumes/:id/versions/:version_number/restore
pub async fn restore_version(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((resume_id, version_number)): Path<(Uuid, i32)>,
) -> Result<Json<RestoreResponse>, AppError> {
    let resume = load_editable(&state.db, resume_id, user.id).await?;
    let snapshot = find_version(&state.db, resume.id, version_number).await?;

    // The sections only change together with the "Restored from" entry.
    let mut tx = state.db.begin().await?;
    sqlx::query(
        "UPDATE resumes SET sections = $2, last_modified = NOW(), updated_at = NOW() WHERE id = $1",
    )
    .bind(resume.id)
    .bind(&snapshot.sections)
    .execute(&mut *tx)
    .await?;

    let version = append_version(
        &mut *tx,
        resume.id,
        user.id,
        &snapshot.sections,
        &restore_description(version_number),
    )
    .await?;
    tx.commit().await?;

    state
        .hub
        .notify(
            resume.id,
            json!({
                "type": "version_restored",
                "userId": user.id,
                "versionNumber": version_number,
            }),
        )
        .await;

    Ok(Json(RestoreResponse {
        message: "Version restored successfully".into(),
        version,
    }))
}
