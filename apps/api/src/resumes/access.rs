//! Who may do what with a resume. Owners may do everything; collaborators may
//! read and write but not delete or manage the collaborator list.

use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{self, ResumeRow};

pub fn is_owner(resume: &ResumeRow, user_id: Uuid) -> bool {
    resume.user_id == user_id
}

pub fn is_collaborator(resume: &ResumeRow, user_id: Uuid) -> bool {
    resume.collaborators.contains(&user_id)
}

pub fn can_view(resume: &ResumeRow, user_id: Uuid) -> bool {
    is_owner(resume, user_id) || is_collaborator(resume, user_id)
}

pub fn can_edit(resume: &ResumeRow, user_id: Uuid) -> bool {
    can_view(resume, user_id)
}

pub fn can_delete(resume: &ResumeRow, user_id: Uuid) -> bool {
    is_owner(resume, user_id)
}

pub fn can_manage_collaborators(resume: &ResumeRow, user_id: Uuid) -> bool {
    is_owner(resume, user_id)
}

/// Maps a lookup result to the access outcome: 404 when the resume is
/// missing, 403 with `denied` when `permitted` rejects the user.
pub fn authorize(
    resume: Option<ResumeRow>,
    user_id: Uuid,
    permitted: fn(&ResumeRow, Uuid) -> bool,
    denied: &str,
) -> Result<ResumeRow, AppError> {
    let resume = resume.ok_or_else(|| AppError::NotFound("Resume not found".into()))?;
    if !permitted(&resume, user_id) {
        return Err(AppError::Forbidden(denied.to_string()));
    }
    Ok(resume)
}

/// Loads the resume and requires view access: 404 when missing, 403 otherwise.
pub async fn load_viewable(
    db: &sqlx::PgPool,
    resume_id: Uuid,
    user_id: Uuid,
) -> Result<ResumeRow, AppError> {
    let resume = resume::find_by_id(db, resume_id).await?;
    authorize(resume, user_id, can_view, "Not authorized to access this resume")
}

pub async fn load_editable(
    db: &sqlx::PgPool,
    resume_id: Uuid,
    user_id: Uuid,
) -> Result<ResumeRow, AppError> {
    let resume = resume::find_by_id(db, resume_id).await?;
    authorize(resume, user_id, can_edit, "Not authorized to edit this resume")
}

/// Loads the resume and requires an owner-level permission such as
/// `can_delete` or `can_manage_collaborators`.
pub async fn load_owned(
    db: &sqlx::PgPool,
    resume_id: Uuid,
    user_id: Uuid,
    permitted: fn(&ResumeRow, Uuid) -> bool,
) -> Result<ResumeRow, AppError> {
    let resume = resume::find_by_id(db, resume_id).await?;
    authorize(resume, user_id, permitted, "Only the owner can perform this action")
}

/// Owner-only lookup that hides other users' resumes entirely (404, not 403).
pub async fn load_own_or_not_found(
    db: &sqlx::PgPool,
    resume_id: Uuid,
    user_id: Uuid,
) -> Result<ResumeRow, AppError> {
    sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = $1 AND user_id = $2")
        .bind(resume_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Resume not found".into()))
}
