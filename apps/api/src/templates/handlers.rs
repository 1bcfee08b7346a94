use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json as SqlJson;
use uuid::Uuid;

use crate::auth::extractor::{AuthUser, MaybeAuthUser};
use crate::errors::AppError;
use crate::models::template::{is_valid_category, TemplateRow, TemplateStyle};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListTemplatesQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub preview_image: String,
    pub sections: Value,
    #[serde(default)]
    pub style: TemplateStyle,
    pub category: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub success: bool,
    pub usage_count: i32,
}

/// Private templates are visible to their creator only.
pub fn can_view_template(template: &TemplateRow, viewer: Option<Uuid>) -> bool {
    template.is_public || (viewer.is_some() && template.creator_id == viewer)
}

/// GET /api/templates?category=
pub async fn list_templates(
    State(state): State<AppState>,
    Query(query): Query<ListTemplatesQuery>,
) -> Result<Json<Vec<TemplateRow>>, AppError> {
    let category = query.category.filter(|c| !c.trim().is_empty());
    let templates: Vec<TemplateRow> = sqlx::query_as(
        r#"
        SELECT * FROM templates
        WHERE is_public AND ($1::TEXT IS NULL OR category = $1)
        ORDER BY usage_count DESC, name ASC
        "#,
    )
    .bind(category)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(templates))
}

/// GET /api/templates/:id
pub async fn get_template(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TemplateRow>, AppError> {
    let template: TemplateRow = sqlx::query_as("SELECT * FROM templates WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Template not found".into()))?;

    if !can_view_template(&template, viewer.map(|u| u.id)) {
        return Err(AppError::Forbidden(
            "Not authorized to view this template".into(),
        ));
    }
    Ok(Json(template))
}

/// POST /api/templates
pub async fn create_template(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<TemplateRow>), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("Template name is required".into()));
    }
    if req.preview_image.trim().is_empty() {
        return Err(AppError::Validation("Preview image is required".into()));
    }
    let category = req.category.unwrap_or_else(|| "professional".to_string());
    if !is_valid_category(&category) {
        return Err(AppError::Validation(format!("Unknown category '{category}'")));
    }

    let template: TemplateRow = sqlx::query_as(
        r#"
        INSERT INTO templates (name, preview_image, sections, style, category, is_public, creator_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(req.name.trim())
    .bind(&req.preview_image)
    .bind(SqlJson(&req.sections))
    .bind(SqlJson(&req.style))
    .bind(&category)
    .bind(req.is_public.unwrap_or(true))
    .bind(user.id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => {
            AppError::Conflict("A template with that name already exists".into())
        }
        other => other,
    })?;

    Ok((StatusCode::CREATED, Json(template)))
}

/// PUT /api/templates/:id/usage
pub async fn increment_usage(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UsageResponse>, AppError> {
    let usage_count: i32 = sqlx::query_scalar(
        "UPDATE templates SET usage_count = usage_count + 1 WHERE id = $1 RETURNING usage_count",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Template not found".into()))?;

    Ok(Json(UsageResponse {
        success: true,
        usage_count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn template(is_public: bool, creator: Option<Uuid>) -> TemplateRow {
        TemplateRow {
            id: Uuid::new_v4(),
            name: "Classic".into(),
            preview_image: "/templates/classic.png".into(),
            sections: SqlJson(json!([])),
            style: SqlJson(TemplateStyle::default()),
            category: "simple".into(),
            is_public,
            creator_id: creator,
            usage_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_public_templates_are_visible_to_everyone() {
        assert!(can_view_template(&template(true, None), None));
        assert!(can_view_template(&template(true, None), Some(Uuid::new_v4())));
    }

    #[test]
    fn test_private_templates_only_for_creator() {
        let creator = Uuid::new_v4();
        let private = template(false, Some(creator));
        assert!(can_view_template(&private, Some(creator)));
        assert!(!can_view_template(&private, Some(Uuid::new_v4())));
        assert!(!can_view_template(&private, None));
        assert!(!can_view_template(&template(false, None), None));
    }
}
