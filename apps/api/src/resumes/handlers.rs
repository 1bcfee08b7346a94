use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::types::Json as SqlJson;
use tracing::info;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::errors::AppError;
use crate::models::resume::{CanvasSize, PageSettings, ResumeDetail, ResumeRow, Section};
use crate::models::user::{self, fetch_summaries};
use crate::resumes::access::{
    can_delete, can_manage_collaborators, is_collaborator, load_editable, load_owned, load_viewable,
};
use crate::resumes::export::ExportFormat;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateResumeRequest {
    pub name: String,
    pub template: Option<String>,
    pub sections: Option<Vec<Section>>,
    pub canvas_size: Option<CanvasSize>,
    pub page_settings: Option<PageSettings>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateResumeRequest {
    pub name: Option<String>,
    pub template: Option<String>,
    pub sections: Option<Vec<Section>>,
    pub canvas_size: Option<CanvasSize>,
    pub page_settings: Option<PageSettings>,
}

#[derive(Debug, Deserialize)]
pub struct AddCollaboratorRequest {
    pub collaborator_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

/// Applies a partial update in place. Fields left out keep their value.
pub fn apply_update(resume: &mut ResumeRow, req: UpdateResumeRequest) -> Result<(), AppError> {
    if let Some(name) = req.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("Resume name cannot be empty".into()));
        }
        resume.name = name.trim().to_string();
    }
    if let Some(template) = req.template {
        resume.template = template;
    }
    if let Some(sections) = req.sections {
        resume.sections = SqlJson(sections);
    }
    if let Some(canvas_size) = req.canvas_size {
        resume.canvas_size = SqlJson(canvas_size);
    }
    if let Some(page_settings) = req.page_settings {
        resume.page_settings = SqlJson(page_settings);
    }
    Ok(())
}

/// Resolves owner and collaborator ids to user summaries.
pub async fn with_users(db: &sqlx::PgPool, resume: ResumeRow) -> Result<ResumeDetail, AppError> {
    let mut ids = resume.collaborators.clone();
    ids.push(resume.user_id);
    let users = fetch_summaries(db, &ids).await?;

    let owner = users.iter().find(|u| u.id == resume.user_id).cloned();
    let collaborators = resume
        .collaborators
        .iter()
        .filter_map(|id| users.iter().find(|u| u.id == *id).cloned())
        .collect();
    Ok(ResumeDetail::new(resume, owner, collaborators))
}

/// POST /api/resumes
pub async fn create_resume(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateResumeRequest>,
) -> Result<(StatusCode, Json<ResumeRow>), AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Resume name is required".into()));
    }

    let resume: ResumeRow = sqlx::query_as(
        r#"
        INSERT INTO resumes (user_id, name, template, sections, canvas_size, page_settings)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(name)
    .bind(req.template.unwrap_or_else(|| "custom".to_string()))
    .bind(SqlJson(req.sections.unwrap_or_default()))
    .bind(SqlJson(req.canvas_size.unwrap_or_default()))
    .bind(SqlJson(req.page_settings.unwrap_or_default()))
    .fetch_one(&state.db)
    .await?;

    info!(resume_id = %resume.id, user_id = %user.id, "Resume created");
    Ok((StatusCode::CREATED, Json(resume)))
}

/// GET /api/resumes
pub async fn list_resumes(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<ResumeRow>>, AppError> {
    let resumes: Vec<ResumeRow> = sqlx::query_as(
        "SELECT * FROM resumes WHERE user_id = $1 OR $1 = ANY(collaborators) ORDER BY updated_at DESC",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(resumes))
}

/// GET /api/resumes/:id
pub async fn get_resume(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeDetail>, AppError> {
    let resume = load_viewable(&state.db, id, user.id).await?;
    Ok(Json(with_users(&state.db, resume).await?))
}

/// PUT /api/resumes/:id
/// Last write wins; there is no version check against concurrent editors.
pub async fn update_resume(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateResumeRequest>,
) -> Result<Json<ResumeRow>, AppError> {
    let mut resume = load_editable(&state.db, id, user.id).await?;
    apply_update(&mut resume, req)?;

    let resume: ResumeRow = sqlx::query_as(
        r#"
        UPDATE resumes
        SET name = $2, template = $3, sections = $4, canvas_size = $5, page_settings = $6,
            last_modified = NOW(), updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(resume.id)
    .bind(&resume.name)
    .bind(&resume.template)
    .bind(&resume.sections)
    .bind(&resume.canvas_size)
    .bind(&resume.page_settings)
    .fetch_one(&state.db)
    .await?;

    state
        .hub
        .notify(
            resume.id,
            json!({
                "type": "resume_saved",
                "userId": user.id,
                "lastModified": resume.last_modified,
            }),
        )
        .await;
    Ok(Json(resume))
}

/// DELETE /api/resumes/:id
pub async fn delete_resume(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let resume = load_owned(&state.db, id, user.id, can_delete).await?;
    sqlx::query("DELETE FROM resumes WHERE id = $1")
        .bind(resume.id)
        .execute(&state.db)
        .await?;
    state.hub.close_room(resume.id, "This resume has been deleted").await;
    info!(resume_id = %resume.id, "Resume deleted");
    Ok(Json(json!({ "message": "Resume removed" })))
}

/// POST /api/resumes/:id/collaborators
pub async fn add_collaborator(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AddCollaboratorRequest>,
) -> Result<Json<ResumeDetail>, AppError> {
    let resume = load_owned(&state.db, id, user.id, can_manage_collaborators).await?;
    if req.collaborator_id == resume.user_id {
        return Err(AppError::Validation(
            "The owner cannot be added as a collaborator".into(),
        ));
    }
    if user::find_by_id(&state.db, req.collaborator_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".into()));
    }
    if is_collaborator(&resume, req.collaborator_id) {
        return Err(AppError::Validation("User is already a collaborator".into()));
    }

    let resume: ResumeRow = sqlx::query_as(
        r#"
        UPDATE resumes
        SET collaborators = array_append(collaborators, $2), updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(resume.id)
    .bind(req.collaborator_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(with_users(&state.db, resume).await?))
}

/// DELETE /api/resumes/:id/collaborators/:collaborator_id
pub async fn remove_collaborator(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((id, collaborator_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ResumeDetail>, AppError> {
    let resume = load_owned(&state.db, id, user.id, can_manage_collaborators).await?;
    if !is_collaborator(&resume, collaborator_id) {
        return Err(AppError::NotFound("Collaborator not found".into()));
    }

    let resume: ResumeRow = sqlx::query_as(
        r#"
        UPDATE resumes
        SET collaborators = array_remove(collaborators, $2), updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(resume.id)
    .bind(collaborator_id)
    .fetch_one(&state.db)
    .await?;

    state
        .hub
        .evict_user(resume.id, collaborator_id, "Your access to this resume was removed")
        .await;
    Ok(Json(with_users(&state.db, resume).await?))
}

/// GET /api/resumes/:id/preview
pub async fn preview_resume(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Html<String>, AppError> {
    let resume = load_viewable(&state.db, id, user.id).await?;
    Ok(Html(ExportFormat::Html.render(&resume)))
}

/// GET /api/resumes/:id/export?format=html|latex
pub async fn export_resume(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let raw = query.format.unwrap_or_else(|| "html".to_string());
    let format = ExportFormat::parse(&raw)
        .ok_or_else(|| AppError::Validation(format!("Unsupported export format '{raw}'")))?;

    let resume = load_viewable(&state.db, id, user.id).await?;
    let body = format.render(&resume);
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", format.filename()),
            ),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resumes::access::tests::resume_owned_by;
    use serde_json::json;

    #[test]
    fn test_partial_update_keeps_missing_fields() {
        let mut resume = resume_owned_by(Uuid::new_v4(), vec![]);
        let sections: Vec<Section> =
            serde_json::from_value(json!([{"id": "s1", "type": "skills", "content": ["Rust"]}]))
                .unwrap();
        apply_update(
            &mut resume,
            UpdateResumeRequest {
                sections: Some(sections.clone()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(resume.name, "My Resume");
        assert_eq!(resume.template, "custom");
        assert_eq!(resume.sections.0, sections);
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let mut resume = resume_owned_by(Uuid::new_v4(), vec![]);
        let result = apply_update(
            &mut resume,
            UpdateResumeRequest {
                name: Some("   ".into()),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(resume.name, "My Resume");
    }

    fn create_request(name: &str) -> CreateResumeRequest {
        CreateResumeRequest {
            name: name.into(),
            template: None,
            sections: None,
            canvas_size: None,
            page_settings: None,
        }
    }

    #[sqlx::test]
    #[ignore = "Requires running PostgreSQL"]
    async fn test_resume_access_statuses(db: sqlx::PgPool) {
        let state = AppState::with_test_pool(db);
        let owner = user::insert_test_user(&state.db, "owner@example.com").await;
        let stranger = user::insert_test_user(&state.db, "stranger@example.com").await;

        let (status, Json(resume)) = create_resume(
            State(state.clone()),
            AuthUser(owner.clone()),
            Json(create_request("Backend CV")),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(resume.user_id, owner.id);

        let Json(detail) = get_resume(State(state.clone()), AuthUser(owner), Path(resume.id))
            .await
            .unwrap();
        assert_eq!(detail.name, "Backend CV");

        let err = get_resume(State(state.clone()), AuthUser(stranger.clone()), Path(resume.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err = get_resume(State(state), AuthUser(stranger), Path(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[ignore = "Requires running PostgreSQL"]
    async fn test_removed_collaborator_leaves_the_room(db: sqlx::PgPool) {
        use crate::collab::events::{ActiveUser, ServerEvent};
        use crate::collab::hub::Member;

        let state = AppState::with_test_pool(db);
        let owner = user::insert_test_user(&state.db, "owner@example.com").await;
        let collaborator = user::insert_test_user(&state.db, "editor@example.com").await;
        let (_, Json(resume)) = create_resume(
            State(state.clone()),
            AuthUser(owner.clone()),
            Json(create_request("Shared CV")),
        )
        .await
        .unwrap();
        add_collaborator(
            State(state.clone()),
            AuthUser(owner.clone()),
            Path(resume.id),
            Json(AddCollaboratorRequest {
                collaborator_id: collaborator.id,
            }),
        )
        .await
        .unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let member = Member {
            user: ActiveUser {
                user_id: collaborator.id,
                username: "editor".into(),
            },
            tx,
        };
        state.hub.join(resume.id, Uuid::new_v4(), member).await;

        remove_collaborator(
            State(state.clone()),
            AuthUser(owner),
            Path((resume.id, collaborator.id)),
        )
        .await
        .unwrap();
        assert!(matches!(rx.try_recv().unwrap(), ServerEvent::Error { .. }));
        assert_eq!(state.hub.room_count().await, 0);
    }
}
