use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::errors::AppError;
use crate::models::latex_document::LatexDocumentRow;
use crate::state::AppState;

const DEFAULT_TITLE: &str = "Untitled Document";

#[derive(Debug, Deserialize)]
pub struct SaveDocumentRequest {
    pub document_id: Option<Uuid>,
    pub title: Option<String>,
    pub code: String,
    pub template: Option<String>,
}

pub fn effective_title(title: Option<&str>) -> String {
    match title.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => DEFAULT_TITLE.to_string(),
    }
}

/// POST /api/latex/save
/// Updates the caller's document when `document_id` is given, otherwise creates one.
pub async fn save_document(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<SaveDocumentRequest>,
) -> Result<Json<LatexDocumentRow>, AppError> {
    let title = effective_title(req.title.as_deref());

    let document = match req.document_id {
        Some(id) => sqlx::query_as::<_, LatexDocumentRow>(
            r#"
            UPDATE latex_documents
            SET title = $3, code = $4, template = COALESCE($5, template),
                last_modified = NOW(), updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user.id)
        .bind(&title)
        .bind(&req.code)
        .bind(&req.template)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".into()))?,
        None => {
            sqlx::query_as::<_, LatexDocumentRow>(
                r#"
                INSERT INTO latex_documents (user_id, title, code, template)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
            )
            .bind(user.id)
            .bind(&title)
            .bind(&req.code)
            .bind(&req.template)
            .fetch_one(&state.db)
            .await?
        }
    };

    Ok(Json(document))
}

/// GET /api/latex/document/:document_id
pub async fn get_document(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(document_id): Path<Uuid>,
) -> Result<Json<LatexDocumentRow>, AppError> {
    let document: LatexDocumentRow =
        sqlx::query_as("SELECT * FROM latex_documents WHERE id = $1 AND user_id = $2")
            .bind(document_id)
            .bind(user.id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Document not found".into()))?;
    Ok(Json(document))
}

/// GET /api/latex/documents
pub async fn list_documents(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<LatexDocumentRow>>, AppError> {
    let documents: Vec<LatexDocumentRow> = sqlx::query_as(
        "SELECT * FROM latex_documents WHERE user_id = $1 ORDER BY last_modified DESC",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(documents))
}
