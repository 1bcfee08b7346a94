//! Keyword extraction and matching between a resume and a job description.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("non-word pattern compiles"));

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for", "with", "by", "about",
    "as", "of", "is", "was", "be", "been", "being", "that", "this", "these", "those", "it", "its",
    "we", "they", "them", "their", "our", "your", "my", "will", "shall", "would", "should", "can",
    "could", "may", "might", "must", "have", "has", "had", "having", "do", "does", "did", "doing",
];

const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Technical Skills",
        &[
            "javascript", "python", "java", "cpp", "ruby", "php", "swift", "golang", "rust",
            "react", "angular", "vue", "node", "express", "django", "flask", "spring", "aws",
            "azure", "gcp", "docker", "kubernetes", "terraform", "jenkins", "sql", "mongodb",
            "postgresql", "mysql", "firebase", "elasticsearch", "git", "github", "rest",
            "graphql", "api", "frontend", "backend", "fullstack", "devops", "cicd", "testing",
            "automation", "algorithms", "data structures",
        ],
    ),
    (
        "Soft Skills",
        &[
            "communication", "teamwork", "collaboration", "leadership", "management",
            "problem solving", "critical thinking", "creativity", "adaptability", "organization",
            "time management", "flexibility", "interpersonal", "presentation", "negotiation",
            "conflict resolution", "customer service", "mentoring", "facilitation", "delegation",
            "strategic", "planning",
        ],
    ),
    (
        "Tools & Technologies",
        &[
            "jira", "trello", "slack", "asana", "confluence", "notion", "microsoft", "photoshop",
            "illustrator", "figma", "sketch", "indesign", "adobe", "tableau", "power bi", "excel",
            "spss", "r", "sas", "matlab", "jupyter", "webpack", "babel", "npm", "yarn", "chrome",
            "firefox", "safari", "android", "ios", "mobile", "responsive", "wordpress", "shopify",
        ],
    ),
    (
        "Industry Knowledge",
        &[
            "finance", "healthcare", "education", "manufacturing", "retail", "logistics",
            "ecommerce", "saas", "marketing", "sales", "legal", "compliance", "hr", "operations",
            "business", "consulting", "strategy", "analytics",
        ],
    ),
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeywordMatch {
    pub text: String,
    pub importance: Importance,
    pub category: String,
}

/// Lower-cases, strips punctuation, drops short and stop words, and keeps the
/// first occurrence of each remaining word.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let cleaned = NON_WORD.replace_all(&text.to_lowercase(), "").into_owned();
    let mut seen = std::collections::HashSet::new();
    cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        .filter(|w| seen.insert(w.to_string()))
        .map(str::to_string)
        .collect()
}

/// How often the job description repeats the keyword (substring occurrences).
pub fn keyword_importance(keyword: &str, job_description: &str) -> Importance {
    let count = job_description.to_lowercase().matches(keyword).count();
    if count >= 5 {
        Importance::High
    } else if count >= 2 {
        Importance::Medium
    } else {
        Importance::Low
    }
}

/// Entries shorter than three characters ("r", "hr") only match exactly.
fn entry_matches(keyword: &str, entry: &str) -> bool {
    if entry.len() < 3 {
        return keyword == entry;
    }
    keyword.contains(entry) || entry.contains(keyword)
}

pub fn keyword_category(keyword: &str) -> &'static str {
    CATEGORIES
        .iter()
        .find(|(_, entries)| entries.iter().any(|entry| entry_matches(keyword, entry)))
        .map(|(name, _)| *name)
        .unwrap_or("Other")
}

/// Splits job keywords into those present in the resume and those missing from it.
pub fn match_keywords(
    job_keywords: &[String],
    resume_keywords: &[String],
    job_description: &str,
) -> (Vec<KeywordMatch>, Vec<KeywordMatch>) {
    let describe = |k: &String| KeywordMatch {
        text: k.clone(),
        importance: keyword_importance(k, job_description),
        category: keyword_category(k).to_string(),
    };
    let (matched, missing): (Vec<&String>, Vec<&String>) = job_keywords
        .iter()
        .partition(|k| resume_keywords.contains(k));
    (
        matched.into_iter().map(describe).collect(),
        missing.into_iter().map(describe).collect(),
    )
}

pub fn keyword_match_percentage(matched: usize, missing: usize) -> u32 {
    if matched == 0 {
        return 0;
    }
    ((matched as f64 / (matched + missing) as f64) * 100.0).round() as u32
}
