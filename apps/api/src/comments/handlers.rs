use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::types::Json as SqlJson;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::errors::AppError;
use crate::models::comment::{CommentRow, CommentWithUsers};
use crate::models::resume::Position;
use crate::models::user::fetch_summaries;
use crate::resumes::access::{is_owner, load_editable, load_viewable};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    pub section: String,
    pub position: Option<Position>,
    pub parent_comment: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ListCommentsQuery {
    pub section: Option<String>,
}

fn require_text(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("Comment {field} is required")));
    }
    Ok(())
}

async fn find_comment(
    db: &sqlx::PgPool,
    resume_id: Uuid,
    comment_id: Uuid,
) -> Result<CommentRow, AppError> {
    sqlx::query_as::<_, CommentRow>("SELECT * FROM comments WHERE id = $1 AND resume_id = $2")
        .bind(comment_id)
        .bind(resume_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".into()))
}

async fn with_users(
    db: &sqlx::PgPool,
    comments: Vec<CommentRow>,
) -> Result<Vec<CommentWithUsers>, AppError> {
    let mut ids: Vec<Uuid> = comments
        .iter()
        .flat_map(|c| std::iter::once(c.user_id).chain(c.resolved_by))
        .collect();
    ids.sort();
    ids.dedup();
    let users = fetch_summaries(db, &ids).await?;
    let lookup = |id: Uuid| users.iter().find(|u| u.id == id).cloned();

    Ok(comments
        .into_iter()
        .map(|comment| CommentWithUsers {
            author: lookup(comment.user_id),
            resolver: comment.resolved_by.and_then(lookup),
            comment,
        })
        .collect())
}

async fn single_with_users(
    db: &sqlx::PgPool,
    comment: CommentRow,
) -> Result<CommentWithUsers, AppError> {
    let mut list = with_users(db, vec![comment]).await?;
    list.pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("comment vanished while loading users")))
}

/// POST /api/resumes/:id/comments
pub async fn create_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(resume_id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentWithUsers>), AppError> {
    require_text(&req.content, "content")?;
    require_text(&req.section, "section")?;
    let resume = load_editable(&state.db, resume_id, user.id).await?;

    if let Some(parent_id) = req.parent_comment {
        let parent_in_resume: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM comments WHERE id = $1 AND resume_id = $2)",
        )
        .bind(parent_id)
        .bind(resume.id)
        .fetch_one(&state.db)
        .await?;
        if !parent_in_resume {
            return Err(AppError::Validation(
                "Parent comment does not belong to this resume".into(),
            ));
        }
    }

    let comment: CommentRow = sqlx::query_as(
        r#"
        INSERT INTO comments (resume_id, user_id, content, section, position, parent_comment_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(resume.id)
    .bind(user.id)
    .bind(req.content.trim())
    .bind(req.section.trim())
    .bind(req.position.map(SqlJson))
    .bind(req.parent_comment)
    .fetch_one(&state.db)
    .await?;

    let comment = single_with_users(&state.db, comment).await?;
    state
        .hub
        .notify(
            resume.id,
            json!({ "type": "comment_added", "comment": &comment }),
        )
        .await;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /api/resumes/:id/comments?section=
pub async fn list_comments(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(resume_id): Path<Uuid>,
    Query(query): Query<ListCommentsQuery>,
) -> Result<Json<Vec<CommentWithUsers>>, AppError> {
    let resume = load_viewable(&state.db, resume_id, user.id).await?;
    let section = query.section.filter(|s| !s.trim().is_empty());

    let comments: Vec<CommentRow> = sqlx::query_as(
        r#"
        SELECT * FROM comments
        WHERE resume_id = $1 AND ($2::TEXT IS NULL OR section = $2)
        ORDER BY created_at DESC
        "#,
    )
    .bind(resume.id)
    .bind(section)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(with_users(&state.db, comments).await?))
}

/// PUT /api/resumes/:id/comments/:comment_id
pub async fn update_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((resume_id, comment_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateCommentRequest>,
) -> Result<Json<CommentWithUsers>, AppError> {
    require_text(&req.content, "content")?;
    let existing = find_comment(&state.db, resume_id, comment_id).await?;
    if existing.user_id != user.id {
        return Err(AppError::Forbidden(
            "Only the author can edit this comment".into(),
        ));
    }

    let comment: CommentRow = sqlx::query_as(
        "UPDATE comments SET content = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(existing.id)
    .bind(req.content.trim())
    .fetch_one(&state.db)
    .await?;

    let comment = single_with_users(&state.db, comment).await?;
    state
        .hub
        .notify(
            resume_id,
            json!({ "type": "comment_updated", "comment": &comment }),
        )
        .await;
    Ok(Json(comment))
}

/// DELETE /api/resumes/:id/comments/:comment_id
/// Replies go with their parent through the cascading foreign key.
pub async fn delete_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((resume_id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let resume = load_viewable(&state.db, resume_id, user.id).await?;
    let comment = find_comment(&state.db, resume.id, comment_id).await?;
    if comment.user_id != user.id && !is_owner(&resume, user.id) {
        return Err(AppError::Forbidden(
            "Only the author or the resume owner can delete this comment".into(),
        ));
    }

    sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(comment.id)
        .execute(&state.db)
        .await?;

    state
        .hub
        .notify(
            resume.id,
            json!({ "type": "comment_deleted", "comment_id": comment.id }),
        )
        .await;
    Ok(Json(json!({ "message": "Comment removed" })))
}

/// PUT /api/resumes/:id/comments/:comment_id/resolve
pub async fn toggle_resolve(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((resume_id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CommentWithUsers>, AppError> {
    let resume = load_editable(&state.db, resume_id, user.id).await?;
    let existing = find_comment(&state.db, resume.id, comment_id).await?;

    let comment: CommentRow = sqlx::query_as(
        r#"
        UPDATE comments
        SET is_resolved = NOT is_resolved,
            resolved_by = CASE WHEN is_resolved THEN NULL ELSE $2 END,
            resolved_at = CASE WHEN is_resolved THEN NULL ELSE NOW() END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(existing.id)
    .bind(user.id)
    .fetch_one(&state.db)
    .await?;

    let comment = single_with_users(&state.db, comment).await?;
    state
        .hub
        .notify(
            resume.id,
            json!({ "type": "comment_resolution_toggled", "comment": &comment }),
        )
        .await;
    Ok(Json(comment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_text_is_rejected() {
        assert!(require_text("looks good", "content").is_ok());
        assert!(matches!(
            require_text("  ", "section"),
            Err(AppError::Validation(msg)) if msg == "Comment section is required"
        ));
    }

    #[test]
    fn test_create_request_accepts_optional_fields() {
        let req: CreateCommentRequest = serde_json::from_value(serde_json::json!({
            "content": "Tighten this bullet",
            "section": "experience"
        }))
        .unwrap();
        assert!(req.position.is_none());
        assert!(req.parent_comment.is_none());
    }
}
