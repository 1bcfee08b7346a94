//! ATS (applicant tracking system) heuristics over plain resume text.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::keywords::extract_keywords;

const ACTION_VERBS: &[&str] = &[
    "managed", "developed", "created", "designed", "implemented", "led", "coordinated", "achieved",
];

const STRUCTURE_HEADERS: &[&str] = &[
    "summary", "objective", "experience", "education", "skills", "projects",
];

const COMPATIBILITY_SECTIONS: &[&str] = &[
    "experience", "education", "skills", "summary", "objective", "projects", "certifications",
];

const COMMON_JOB_KEYWORDS: &[&str] = &[
    "experience", "skills", "project", "developed", "managed", "led", "team", "collaborate",
    "implement", "create", "design", "analyze", "solve", "responsible", "achieve", "improve",
    "increase", "decrease", "percent", "budget", "client", "customer", "timeline", "deliver",
    "success", "goal", "metric",
];

static NUMBERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+%|\d+").expect("number pattern compiles"));
static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank-run pattern compiles"));
static BULLETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"•|-|\*").expect("bullet pattern compiles"));
static CAPS_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[A-Z][A-Z \t]+$").expect("caps-line pattern compiles"));
static CAPS_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[A-Z][^a-z\n]*\n").expect("heading pattern compiles"));
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("email pattern compiles")
});
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\+\d{1,3}[ -]?)?\(?\d{3}\)?[ -]?\d{3}[ -]?\d{4}").expect("phone pattern compiles")
});
static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("sentence pattern compiles"));

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Matches any of `words` as a whole word.
fn any_word(words: &[&str]) -> Regex {
    let alternation = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{alternation})\b")).expect("word list pattern compiles")
}

static ACTION_VERB_WORDS: LazyLock<Regex> = LazyLock::new(|| any_word(ACTION_VERBS));
static JOB_KEYWORD_WORDS: LazyLock<Regex> = LazyLock::new(|| any_word(COMMON_JOB_KEYWORDS));

pub fn action_verb_count(text: &str) -> usize {
    ACTION_VERB_WORDS.find_iter(&text.to_lowercase()).count()
}

/// 0–20: three points per recognised section header.
pub fn structure_score(text: &str) -> u32 {
    let lower = text.to_lowercase();
    let found = STRUCTURE_HEADERS
        .iter()
        .filter(|h| lower.contains(*h))
        .count() as u32;
    (found * 3).min(20)
}

/// 0–30: quantified achievements, action verbs and overall length.
pub fn content_score(text: &str) -> u32 {
    let mut score = 15;

    let numbers = NUMBERS.find_iter(text).count();
    if numbers > 10 {
        score += 5;
    } else if numbers > 5 {
        score += 3;
    }

    let verbs = action_verb_count(text);
    if verbs > 15 {
        score += 5;
    } else if verbs > 8 {
        score += 3;
    }

    let words = word_count(text);
    if words > 300 && words < 800 {
        score += 5;
    } else if words > 200 && words < 1000 {
        score += 3;
    }

    score.min(30)
}

/// 0–30: share of the job description's keywords found in the resume.
pub fn keyword_score(job_description: &str, matched: usize) -> u32 {
    let total = extract_keywords(job_description).len();
    if total == 0 {
        return 0;
    }
    ((matched as f64 / total as f64) * 30.0).round().min(30.0) as u32
}

/// 0–20: spacing, bullet usage and upper-case section headings.
pub fn formatting_score(text: &str) -> u32 {
    let mut score = 10;
    if !BLANK_RUNS.is_match(text) {
        score += 5;
    }
    if BULLETS.find_iter(text).count() > 5 {
        score += 5;
    }
    if CAPS_LINES.find_iter(text).count() > 3 {
        score += 5;
    }
    score.min(20)
}

/// Overall ATS score in 0..=100. Without a job description the keyword
/// component is a neutral 15.
pub fn calculate_ats_score(text: &str, job_description: Option<&str>, matched: usize) -> u32 {
    let keywords = match job_description.filter(|jd| !jd.trim().is_empty()) {
        Some(jd) => keyword_score(jd, matched),
        None => 15,
    };
    (structure_score(text) + content_score(text) + keywords + formatting_score(text)).min(100)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AtsDetails {
    pub formatting: f64,
    pub keywords: f64,
    pub readability: f64,
    pub structure: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AtsCompatibility {
    pub score: u32,
    pub details: AtsDetails,
}

/// Compatibility of an uploaded resume. A positive `match_score` from an
/// earlier analysis replaces the keyword-density estimate.
pub fn ats_compatibility(text: &str, match_score: Option<f64>) -> AtsCompatibility {
    let lower = text.to_lowercase();
    let words = word_count(text);
    let mut details = AtsDetails::default();

    details.formatting += 20.0;
    if text.is_ascii() {
        details.formatting += 20.0;
    }
    if words > 300 && words < 1000 {
        details.formatting += 20.0;
    } else if words > 200 {
        details.formatting += 10.0;
    }
    let sections = COMPATIBILITY_SECTIONS
        .iter()
        .filter(|s| lower.contains(*s))
        .count();
    if sections >= 4 {
        details.formatting += 20.0;
    } else if sections >= 2 {
        details.formatting += 10.0;
    }
    if EMAIL.is_match(text) {
        details.formatting += 10.0;
    }
    if PHONE.is_match(text) {
        details.formatting += 10.0;
    }

    details.keywords = match match_score.filter(|s| *s > 0.0) {
        Some(score) => score.min(100.0),
        None => {
            let hits = JOB_KEYWORD_WORDS.find_iter(&lower).count();
            let density = hits as f64 / words.max(1) as f64;
            (density * 1000.0).round().min(100.0)
        }
    };

    let sentences = SENTENCE_BREAK
        .split(text)
        .filter(|s| !s.trim().is_empty())
        .count();
    let per_sentence = words as f64 / sentences.max(1) as f64;
    details.readability = if (10.0..=20.0).contains(&per_sentence) {
        80.0
    } else if per_sentence > 20.0 && per_sentence <= 25.0 {
        70.0
    } else if per_sentence > 25.0 {
        60.0
    } else {
        75.0
    };

    let bullets = BULLETS.find_iter(text).count();
    details.structure += if bullets > 10 {
        40.0
    } else if bullets > 5 {
        30.0
    } else {
        20.0
    };
    details.structure += if CAPS_HEADING.is_match(text) { 40.0 } else { 20.0 };

    let score = (details.formatting * 0.3
        + details.keywords * 0.4
        + details.readability * 0.15
        + details.structure * 0.15)
        .round()
        .clamp(0.0, 100.0) as u32;

    AtsCompatibility { score, details }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structure_score_counts_headers() {
        assert_eq!(structure_score("nothing relevant"), 0);
        assert_eq!(structure_score("Summary\nExperience\nEducation"), 9);
        assert_eq!(
            structure_score("summary objective experience education skills projects"),
            18
        );
    }

    #[test]
    fn test_content_score_rewards_numbers_and_verbs() {
        assert_eq!(content_score("short"), 15);
        let numbers = "1 2 3 4 5 6 7 8 9 10 11 12";
        assert_eq!(content_score(numbers), 20);
        let verbs = "led ".repeat(9);
        assert_eq!(content_score(&verbs), 18);
    }

    #[test]
    fn test_action_verbs_match_whole_words_only() {
        assert_eq!(action_verb_count("Led the team, then misled nobody. LED again"), 2);
    }

    #[test]
    fn test_keyword_score_bounds() {
        assert_eq!(keyword_score("rust sql kafka", 3), 30);
        assert_eq!(keyword_score("rust sql kafka", 0), 0);
        assert_eq!(keyword_score("a an of", 0), 0);
    }

    #[test]
    fn test_formatting_score() {
        assert_eq!(formatting_score("a\n\n\n\nb"), 10);
        assert_eq!(formatting_score("plain"), 15);
        let rich = "SUMMARY\n- a\n- b\n- c\nEXPERIENCE\n- d\n- e\n- f\nEDUCATION\nSKILLS\n";
        assert_eq!(formatting_score(rich), 20);
    }

    #[test]
    fn test_ats_score_without_job_uses_neutral_keywords() {
        let text = "plain";
        assert_eq!(calculate_ats_score(text, None, 0), 0 + 15 + 15 + 15);
        assert_eq!(calculate_ats_score(text, Some("  "), 0), 45);
        assert_eq!(calculate_ats_score(text, Some("rust kafka"), 1), 15 + 15 + 15);
    }

    #[test]
    fn test_ats_score_is_capped() {
        let mut text = String::from(
            "SUMMARY\nOBJECTIVE\nEXPERIENCE\nEDUCATION\nSKILLS\nPROJECTS\n",
        );
        for i in 0..40 {
            text.push_str(&format!("- developed and managed {i} things, led {i}% growth\n"));
        }
        let score = calculate_ats_score(&text, Some("developed managed"), 2);
        assert!(score <= 100);
        assert!(score >= 90);
    }

    #[test]
    fn test_compatibility_uses_match_score_when_positive() {
        let report = ats_compatibility("Experience with rust", Some(72.0));
        assert_eq!(report.details.keywords, 72.0);
        let fallback = ats_compatibility("Experience with rust", Some(0.0));
        assert_ne!(fallback.details.keywords, 0.0);
    }

    #[test]
    fn test_compatibility_stays_within_range_for_oversized_match_score() {
        let text = "jane@example.com 555-123-4567\nEXPERIENCE\n".repeat(10);
        let report = ats_compatibility(&text, Some(250.0));
        assert_eq!(report.details.keywords, 100.0);
        assert!(report.score <= 100);

        let negative = ats_compatibility(&text, Some(-40.0));
        assert!(negative.details.keywords >= 0.0);
        assert!(negative.score <= 100);
    }

    #[test]
    fn test_job_keyword_density_counts_whole_words() {
        let report = ats_compatibility("team team teamwork", None);
        // 2 hits over 3 words
        assert_eq!(report.details.keywords, 100.0);
        let sparse = ats_compatibility(&format!("team {}", "word ".repeat(99)), None);
        assert_eq!(sparse.details.keywords, 10.0);
    }

    #[test]
    fn test_compatibility_detects_contact_details() {
        let with_contact = ats_compatibility("jane@example.com 555-123-4567", None);
        let without = ats_compatibility("no contact here", None);
        assert_eq!(
            with_contact.details.formatting - without.details.formatting,
            20.0
        );
    }

    #[test]
    fn test_compatibility_weights() {
        let report = ats_compatibility("x", Some(100.0));
        // formatting 40 (parsed + ascii), readability 75, structure 40
        assert_eq!(report.details.formatting, 40.0);
        assert_eq!(report.details.readability, 75.0);
        assert_eq!(report.details.structure, 40.0);
        let expected = (40.0 * 0.3 + 100.0 * 0.4 + 75.0 * 0.15 + 40.0 * 0.15_f64).round() as u32;
        assert_eq!(report.score, expected);
    }
}
