pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::analysis::handlers as analyzer;
use crate::auth::{handlers as auth, oauth};
use crate::collab::socket;
use crate::comments::handlers as comments;
use crate::jobs::handlers as jobs;
use crate::latex::handlers as latex;
use crate::rate_limit::limit_auth_requests;
use crate::resumes::handlers as resumes;
use crate::state::AppState;
use crate::templates::handlers as templates;
use crate::users::handlers as users;
use crate::versions::handlers as versions;

/// Upload routes accept a 5 MiB file plus multipart framing.
const UPLOAD_BODY_LIMIT: usize = 6 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .merge(auth_routes(&state))
        // Users
        .route("/api/users/profile", put(users::update_profile))
        .route(
            "/api/users/profile/picture",
            post(users::upload_picture).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/users/search", get(users::search_users))
        // Resumes
        .route(
            "/api/resumes",
            get(resumes::list_resumes).post(resumes::create_resume),
        )
        .route(
            "/api/resumes/:id",
            get(resumes::get_resume)
                .put(resumes::update_resume)
                .delete(resumes::delete_resume),
        )
        .route(
            "/api/resumes/:id/collaborators",
            post(resumes::add_collaborator),
        )
        .route(
            "/api/resumes/:id/collaborators/:collaborator_id",
            delete(resumes::remove_collaborator),
        )
        .route("/api/resumes/:id/preview", get(resumes::preview_resume))
        .route("/api/resumes/:id/export", get(resumes::export_resume))
        // Versions
        .route(
            "/api/resumes/:id/versions",
            get(versions::list_versions).post(versions::create_version),
        )
        .route(
            "/api/resumes/:id/versions/:version_number",
            get(versions::get_version),
        )
        .route(
            "/api/resumes/:id/versions/:version_number/restore",
            post(versions::restore_version),
        )
        // Comments
        .route(
            "/api/resumes/:id/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/api/resumes/:id/comments/:comment_id",
            put(comments::update_comment).delete(comments::delete_comment),
        )
        .route(
            "/api/resumes/:id/comments/:comment_id/resolve",
            put(comments::toggle_resolve),
        )
        // LaTeX documents
        .route("/api/latex/save", post(latex::save_document))
        .route("/api/latex/documents", get(latex::list_documents))
        .route(
            "/api/latex/document/:document_id",
            get(latex::get_document),
        )
        // Templates
        .route(
            "/api/templates",
            get(templates::list_templates).post(templates::create_template),
        )
        .route("/api/templates/:id", get(templates::get_template))
        .route("/api/templates/:id/usage", put(templates::increment_usage))
        // Analyzer
        .route("/api/analyzer/analyze", post(analyzer::analyze))
        .route(
            "/api/analyzer/analyze-with-job",
            post(analyzer::analyze_with_job),
        )
        .route("/api/analyzer/history", get(analyzer::history))
        .route("/api/analyzer/save", post(analyzer::save))
        .route(
            "/api/analyzer/match",
            post(analyzer::match_upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        // Jobs
        .route("/api/jobs/search", post(jobs::search_jobs))
        .route("/api/jobs/recommendations", post(jobs::recommendations))
        // Collaboration
        .route("/api/collab/ws", get(socket::ws_handler))
        .with_state(state)
}

/// Authentication endpoints, all behind the per-client rate limiter.
fn auth_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/verify-email", post(auth::verify_email))
        .route("/api/auth/resend-otp", post(auth::resend_otp))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/google", get(oauth::google_login))
        .route("/api/auth/google/callback", get(oauth::google_callback))
        .route("/api/auth/github", get(oauth::github_login))
        .route("/api/auth/github/callback", get(oauth::github_callback))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            limit_auth_requests,
        ))
}
