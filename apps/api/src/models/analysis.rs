use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalysisResultRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub user_id: Uuid,
    pub analysis_data: Json<Value>,
    pub job_description: String,
    pub resume_title: String,
    pub match_score: f64,
    pub ats_score: f64,
    pub created_at: DateTime<Utc>,
}

/// History listing entry; the full payload stays in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalysisSummary {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub resume_title: String,
    pub job_description: String,
    pub match_score: f64,
    pub ats_score: f64,
    pub created_at: DateTime<Utc>,
}
