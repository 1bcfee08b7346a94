use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::types::Json as SqlJson;
use tracing::{info, warn};
use uuid::Uuid;

use super::ats::{ats_compatibility, calculate_ats_score, AtsDetails};
use super::extract::{extract_text, is_supported};
use super::keywords::{extract_keywords, keyword_match_percentage, match_keywords, KeywordMatch};
use super::prompts;
use super::recommendations::{
    generate_recommendations, metrics, overall_suggestions, section_recommendations, Metric,
    SectionRecommendations,
};
use crate::auth::extractor::AuthUser;
use crate::errors::AppError;
use crate::llm_client::{parse_json_reply, prompts::CAREER_COACH_SYSTEM, prompts::JSON_ONLY_SYSTEM};
use crate::models::analysis::{AnalysisResultRow, AnalysisSummary};
use crate::resumes::access::{load_own_or_not_found, load_viewable};
use crate::resumes::export::resume_text;
use crate::state::AppState;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
const MIN_JOB_DESCRIPTION_CHARS: usize = 10;
const MIN_EXTRACTED_CHARS: usize = 50;
const FALLBACK_MATCH_SCORE: f64 = 50.0;
const FALLBACK_RECOMMENDATIONS: &str = "Sorry, we encountered an issue processing the analysis. \
    Here are some general tips: Tailor your resume to match the job description, highlight \
    relevant skills, and quantify your achievements.";

// ──────────────────────────────────────────────────────────────────────────
// Request / response types
// ──────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub resume_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeWithJobRequest {
    pub resume_id: Uuid,
    pub job_description: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveAnalysisRequest {
    pub resume_id: Uuid,
    pub analysis_result: Value,
    pub job_description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GeneralAnalysis {
    pub resume_id: Uuid,
    pub user_id: Uuid,
    pub general_feedback: Vec<String>,
    pub ats_score: u32,
    pub timestamp: DateTime<Utc>,
    pub resume_title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AiAnalysis {
    pub resume: Option<String>,
    pub job_match: Option<String>,
}

/// Heuristic part of a job-targeted analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobAnalysis {
    pub match_score: u32,
    pub ats_score: u32,
    pub matched_keywords: Vec<KeywordMatch>,
    pub missing_keywords: Vec<KeywordMatch>,
    pub section_recommendations: SectionRecommendations,
    pub overall_suggestions: Vec<String>,
    pub metrics: Vec<Metric>,
}

#[derive(Debug, Serialize)]
pub struct JobAnalysisReport {
    #[serde(flatten)]
    pub analysis: JobAnalysis,
    pub ai_analysis: AiAnalysis,
    pub resume_id: Uuid,
    pub user_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub resume_title: String,
    pub job_description: String,
}

/// Skill comparison produced by the model for an uploaded resume.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SkillMatch {
    pub match_score: f64,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub recommendations: String,
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    #[serde(flatten)]
    pub skills: SkillMatch,
    pub ats_score: u32,
    pub ats_details: AtsDetails,
}

// ──────────────────────────────────────────────────────────────────────────
// Pure helpers
// ──────────────────────────────────────────────────────────────────────────

/// Scores resume text against a job description without calling the model.
pub fn analyze_against_job(text: &str, job_description: &str) -> JobAnalysis {
    let job_keywords = extract_keywords(job_description);
    let resume_keywords = extract_keywords(text);
    let (matched, missing) = match_keywords(&job_keywords, &resume_keywords, job_description);
    let match_score = keyword_match_percentage(matched.len(), missing.len());
    let ats_score = calculate_ats_score(text, Some(job_description), matched.len());

    JobAnalysis {
        match_score,
        ats_score,
        metrics: metrics(match_score, ats_score, text),
        matched_keywords: matched,
        missing_keywords: missing,
        section_recommendations: section_recommendations(),
        overall_suggestions: overall_suggestions(),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn fallback_skill_match() -> SkillMatch {
    SkillMatch {
        match_score: FALLBACK_MATCH_SCORE,
        matched_skills: vec![],
        missing_skills: vec![],
        recommendations: FALLBACK_RECOMMENDATIONS.to_string(),
    }
}

/// Interprets the model's reply. A reply that is not JSON or lacks a numeric
/// `matchScore` yields the fallback; other malformed fields are defaulted.
pub fn skill_match_from_reply(reply: &str) -> SkillMatch {
    let value: Value = match parse_json_reply(reply) {
        Ok(v) => v,
        Err(e) => {
            warn!("Unparseable skill match reply: {e}");
            return fallback_skill_match();
        }
    };
    let Some(match_score) = value.get("matchScore").and_then(Value::as_f64) else {
        warn!("Skill match reply is missing a numeric matchScore");
        return fallback_skill_match();
    };

    SkillMatch {
        match_score: match_score.clamp(0.0, 100.0),
        matched_skills: string_list(value.get("matchedSkills")),
        missing_skills: string_list(value.get("missingSkills")),
        recommendations: value
            .get("recommendations")
            .and_then(Value::as_str)
            .unwrap_or("No specific recommendations available.")
            .to_string(),
    }
}

/// Pulls the scores out of a client-supplied analysis payload.
pub fn stored_scores(analysis: &Value) -> (f64, f64) {
    let score = |key: &str| analysis.get(key).and_then(Value::as_f64).unwrap_or(0.0);
    (score("match_score"), score("ats_score"))
}

// ──────────────────────────────────────────────────────────────────────────
// Handlers
// ──────────────────────────────────────────────────────────────────────────

/// POST /api/analyzer/analyze
pub async fn analyze(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<GeneralAnalysis>, AppError> {
    let resume = load_own_or_not_found(&state.db, req.resume_id, user.id).await?;
    let text = resume_text(&resume.sections);

    Ok(Json(GeneralAnalysis {
        resume_id: resume.id,
        user_id: user.id,
        general_feedback: generate_recommendations(&text),
        ats_score: calculate_ats_score(&text, None, 0),
        timestamp: Utc::now(),
        resume_title: resume.name,
    }))
}

/// POST /api/analyzer/analyze-with-job
pub async fn analyze_with_job(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<AnalyzeWithJobRequest>,
) -> Result<Json<JobAnalysisReport>, AppError> {
    let job_description = req.job_description.trim();
    if job_description.is_empty() {
        return Err(AppError::Validation("Job description is required".into()));
    }

    let resume = load_own_or_not_found(&state.db, req.resume_id, user.id).await?;
    let text = resume_text(&resume.sections);
    let analysis = analyze_against_job(&text, job_description);

    let feedback_prompt = prompts::resume_feedback_prompt(&text);
    let match_prompt = prompts::job_match_prompt(&text, job_description);
    let (feedback, job_match) = tokio::join!(
        state.llm.call_text(&feedback_prompt, CAREER_COACH_SYSTEM),
        state.llm.call_text(&match_prompt, CAREER_COACH_SYSTEM),
    );
    let ai_analysis = AiAnalysis {
        resume: feedback
            .map_err(|e| warn!("Resume feedback generation failed: {e}"))
            .ok(),
        job_match: job_match
            .map_err(|e| warn!("Job match narrative failed: {e}"))
            .ok(),
    };

    info!(
        "Analyzed resume {} against job description (match {}%, ats {})",
        resume.id, analysis.match_score, analysis.ats_score
    );

    Ok(Json(JobAnalysisReport {
        analysis,
        ai_analysis,
        resume_id: resume.id,
        user_id: user.id,
        timestamp: Utc::now(),
        resume_title: resume.name,
        job_description: job_description.to_string(),
    }))
}

/// GET /api/analyzer/history
pub async fn history(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<AnalysisSummary>>, AppError> {
    let rows = sqlx::query_as::<_, AnalysisSummary>(
        "SELECT id, resume_id, resume_title, job_description, match_score, ats_score, created_at
         FROM analysis_results
         WHERE user_id = $1
         ORDER BY created_at DESC",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows))
}

/// POST /api/analyzer/save
pub async fn save(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<SaveAnalysisRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if !req.analysis_result.is_object() {
        return Err(AppError::Validation(
            "analysis_result must be an object".into(),
        ));
    }
    let resume = load_viewable(&state.db, req.resume_id, user.id).await?;
    let (match_score, ats_score) = stored_scores(&req.analysis_result);

    let saved = sqlx::query_as::<_, AnalysisResultRow>(
        "INSERT INTO analysis_results
             (resume_id, user_id, analysis_data, job_description, resume_title, match_score, ats_score)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING *",
    )
    .bind(resume.id)
    .bind(user.id)
    .bind(SqlJson(&req.analysis_result))
    .bind(req.job_description.unwrap_or_default())
    .bind(&resume.name)
    .bind(match_score)
    .bind(ats_score)
    .fetch_one(&state.db)
    .await?;
    info!(analysis_id = %saved.id, resume_id = %saved.resume_id, "Analysis saved");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Analysis saved successfully",
            "analysis_id": saved.id
        })),
    ))
}

/// POST /api/analyzer/match
/// Multipart fields: `resume` (PDF or plain text) and `job_description`.
pub async fn match_upload(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<MatchResponse>, AppError> {
    let mut upload: Option<(String, Bytes)> = None;
    let mut job_description = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("resume") => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
                upload = Some((content_type, bytes));
            }
            Some("job_description") => {
                job_description = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid job description: {e}")))?;
            }
            _ => {}
        }
    }

    let (content_type, bytes) =
        upload.ok_or_else(|| AppError::Validation("Resume file is required".into()))?;
    let job_description = job_description.trim();
    if job_description.chars().count() < MIN_JOB_DESCRIPTION_CHARS {
        return Err(AppError::Validation(
            "A valid job description is required (minimum 10 characters)".into(),
        ));
    }
    if !is_supported(&content_type) {
        return Err(AppError::Validation(
            "Only PDF and plain text resumes are supported".into(),
        ));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::Validation("Resume file must be 5 MB or smaller".into()));
    }

    let text = extract_text(&content_type, bytes).await.map_err(|e| {
        warn!("Resume extraction failed: {e}");
        AppError::UnprocessableEntity(
            "Could not process the resume file. Please try a different file format.".into(),
        )
    })?;
    if text.trim().chars().count() < MIN_EXTRACTED_CHARS {
        return Err(AppError::Validation(
            "Could not extract sufficient text from the resume. Please ensure the file is not corrupted or empty."
                .into(),
        ));
    }

    let reply = state
        .llm
        .call_text(&prompts::skill_match_prompt(&text, job_description), JSON_ONLY_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;
    let skills = skill_match_from_reply(&reply);
    let ats = ats_compatibility(&text, Some(skills.match_score));

    Ok(Json(MatchResponse {
        skills,
        ats_score: ats.score,
        ats_details: ats.details,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_against_job_scores_keywords() {
        let analysis = analyze_against_job(
            "Experience: developed Rust services with PostgreSQL",
            "Rust engineer with PostgreSQL and Kafka",
        );
        let matched: Vec<_> = analysis
            .matched_keywords
            .iter()
            .map(|k| k.text.as_str())
            .collect();
        assert_eq!(matched, vec!["rust", "postgresql"]);
        // rust, engineer, postgresql, kafka
        assert_eq!(analysis.missing_keywords.len(), 2);
        assert_eq!(analysis.match_score, 50);
        assert_eq!(analysis.metrics.len(), 4);
        assert_eq!(analysis.overall_suggestions.len(), 5);
    }

    #[test]
    fn test_job_without_keywords_scores_zero_match() {
        let analysis = analyze_against_job("Rust developer", "a an of the");
        assert_eq!(analysis.match_score, 0);
        assert!(analysis.matched_keywords.is_empty());
    }

    #[test]
    fn test_skill_match_reply_parsed() {
        let reply = r#"```json
{"matchScore": 82, "matchedSkills": ["Rust", 3], "missingSkills": "none", "recommendations": "Add Kafka"}
```"#;
        let skills = skill_match_from_reply(reply);
        assert_eq!(skills.match_score, 82.0);
        assert_eq!(skills.matched_skills, vec!["Rust"]);
        assert!(skills.missing_skills.is_empty());
        assert_eq!(skills.recommendations, "Add Kafka");
    }

    #[test]
    fn test_skill_match_defaults_recommendations() {
        let skills = skill_match_from_reply(r#"{"matchScore": 10}"#);
        assert_eq!(skills.recommendations, "No specific recommendations available.");
    }

    #[test]
    fn test_skill_match_fallback() {
        assert_eq!(skill_match_from_reply("I think it's a great match!"), fallback_skill_match());
        let missing_score = skill_match_from_reply(r#"{"matchScore": "high"}"#);
        assert_eq!(missing_score.match_score, 50.0);
    }

    #[test]
    fn test_skill_match_score_is_clamped() {
        let high = skill_match_from_reply(r#"{"matchScore": 250, "matchedSkills": ["Rust"]}"#);
        assert_eq!(high.match_score, 100.0);
        let ats = ats_compatibility("Experience with Rust and SQL", Some(high.match_score));
        assert!(ats.score <= 100);

        let low = skill_match_from_reply(r#"{"matchScore": -12}"#);
        assert_eq!(low.match_score, 0.0);
    }

    #[test]
    fn test_stored_scores() {
        assert_eq!(
            stored_scores(&json!({"match_score": 64, "ats_score": 71.5})),
            (64.0, 71.5)
        );
        assert_eq!(stored_scores(&json!({"other": true})), (0.0, 0.0));
    }

    #[test]
    fn test_report_flattens_heuristics() {
        let report = JobAnalysisReport {
            analysis: analyze_against_job("rust", "rust"),
            ai_analysis: AiAnalysis::default(),
            resume_id: Uuid::nil(),
            user_id: Uuid::nil(),
            timestamp: Utc::now(),
            resume_title: "R".into(),
            job_description: "rust".into(),
        };
        let body = serde_json::to_value(&report).unwrap();
        assert_eq!(body["match_score"], 100);
        assert!(body["ai_analysis"]["resume"].is_null());
        assert!(body["section_recommendations"]["skills"].is_string());
    }
}
