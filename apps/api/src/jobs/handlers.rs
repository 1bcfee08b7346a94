use std::sync::LazyLock;

use axum::{extract::State, Json};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::cache;
use crate::analysis::keywords::extract_keywords;
use crate::analysis::prompts::keywords_prompt;
use crate::auth::extractor::AuthUser;
use crate::errors::AppError;
use crate::llm_client::prompts::CAREER_COACH_SYSTEM;
use crate::models::job::JobRow;
use crate::resumes::access::load_own_or_not_found;
use crate::resumes::export::resume_text;
use crate::state::AppState;
use crate::users::handlers::escape_like;

const SEARCH_LIMIT: i64 = 20;
const RECOMMENDATION_LIMIT: i64 = 10;
const MAX_SEARCH_TERMS: usize = 50;

static LIST_NUMBERING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\s*").expect("numbering pattern compiles"));

const SEARCH_SQL: &str = "SELECT * FROM jobs
     WHERE is_active
       AND to_tsvector('english',
               title || ' ' || description || ' ' || company || ' ' || array_to_string(skills, ' '))
           @@ websearch_to_tsquery('english', $1)
       AND ($2::text IS NULL OR location ILIKE '%' || $2 || '%')
     ORDER BY date_posted DESC
     LIMIT $3";

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationsRequest {
    pub resume_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub jobs: Vec<JobRow>,
    pub keywords: Vec<String>,
}

/// Normalises a model reply into a comma separated list: drops "1." style
/// numbering and turns line breaks into separators.
pub fn clean_keyword_reply(reply: &str) -> String {
    LIST_NUMBERING.replace_all(reply, "").replace('\n', ", ")
}

pub fn split_keywords(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builds a `websearch_to_tsquery` string that matches any of the keywords' words.
pub fn any_of_query(keywords: &[String]) -> String {
    let mut terms: Vec<String> = Vec::new();
    for word in keywords.iter().flat_map(|k| extract_keywords(k)) {
        if !terms.contains(&word) {
            terms.push(word);
        }
        if terms.len() == MAX_SEARCH_TERMS {
            break;
        }
    }
    terms.join(" or ")
}

async fn find_jobs(
    db: &sqlx::PgPool,
    query: &str,
    location: Option<&str>,
    limit: i64,
) -> Result<Vec<JobRow>, AppError> {
    let jobs = sqlx::query_as::<_, JobRow>(SEARCH_SQL)
        .bind(query)
        .bind(location.map(escape_like))
        .bind(limit)
        .fetch_all(db)
        .await?;
    Ok(jobs)
}

/// POST /api/jobs/search
pub async fn search_jobs(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Json(req): Json<SearchRequest>,
) -> Result<Json<Vec<JobRow>>, AppError> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(AppError::Validation("Search query is required".into()));
    }
    let location = req
        .location
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty());

    let key = cache::search_key(query, location);
    if let Some(jobs) = cache::get::<Vec<JobRow>>(&state.redis, &key).await {
        return Ok(Json(jobs));
    }

    let jobs = find_jobs(&state.db, query, location, SEARCH_LIMIT).await?;
    cache::put(&state.redis, &key, &jobs).await;
    Ok(Json(jobs))
}

/// POST /api/jobs/recommendations
pub async fn recommendations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<RecommendationsRequest>,
) -> Result<Json<RecommendationsResponse>, AppError> {
    let resume = load_own_or_not_found(&state.db, req.resume_id, user.id).await?;
    let text = resume_text(&resume.sections);

    let keywords_text = match state
        .llm
        .call_text(&keywords_prompt(&text), CAREER_COACH_SYSTEM)
        .await
    {
        Ok(reply) => clean_keyword_reply(&reply),
        Err(e) => {
            warn!("Keyword extraction failed, searching with resume text: {e}");
            text
        }
    };
    let keywords = split_keywords(&keywords_text);

    let query = any_of_query(&keywords);
    let jobs = if query.is_empty() {
        Vec::new()
    } else {
        find_jobs(&state.db, &query, None, RECOMMENDATION_LIMIT).await?
    };
    info!(
        "Recommended {} jobs for resume {} from {} keywords",
        jobs.len(),
        resume.id,
        keywords.len()
    );

    Ok(Json(RecommendationsResponse { jobs, keywords }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_keyword_reply() {
        let reply = "1. Rust\n2. PostgreSQL\n3. Team Leadership";
        let cleaned = clean_keyword_reply(reply);
        assert_eq!(cleaned, "Rust, PostgreSQL, Team Leadership");
        assert_eq!(
            split_keywords(&cleaned),
            vec!["Rust", "PostgreSQL", "Team Leadership"]
        );
    }

    #[test]
    fn test_split_keywords_skips_blanks() {
        assert_eq!(split_keywords("rust, , sql,"), vec!["rust", "sql"]);
        assert!(split_keywords("").is_empty());
    }

    #[test]
    fn test_any_of_query_flattens_and_dedupes() {
        let keywords = vec![
            "Rust".to_string(),
            "Team Leadership".to_string(),
            "rust".to_string(),
        ];
        assert_eq!(any_of_query(&keywords), "rust or team or leadership");
        assert_eq!(any_of_query(&[]), "");
    }

    #[test]
    fn test_any_of_query_caps_terms() {
        let text = (0..200).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
        let query = any_of_query(&[text]);
        assert_eq!(query.split(" or ").count(), MAX_SEARCH_TERMS);
    }
}
