//! Static and text-driven improvement advice shown alongside scores.

use serde::{Deserialize, Serialize};

use super::ats::{action_verb_count, content_score, formatting_score};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionRecommendations {
    pub summary: String,
    pub experience: String,
    pub skills: String,
    pub education: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metric {
    pub name: String,
    pub value: String,
    pub description: String,
}

/// General feedback for a resume analysed without a job description.
pub fn generate_recommendations(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let lower = text.to_lowercase();

    let words = text.split_whitespace().count();
    if words < 200 {
        out.push(
            "Your resume is quite short. Consider adding more details about your experience and skills."
                .to_string(),
        );
    } else if words > 1000 {
        out.push(
            "Your resume is quite long. Consider focusing on the most relevant information."
                .to_string(),
        );
    }

    if !lower.contains("experience") && !lower.contains("work history") {
        out.push(
            "Consider adding a dedicated \"Experience\" or \"Work History\" section.".to_string(),
        );
    }
    if !lower.contains("education") {
        out.push(
            "Consider adding an \"Education\" section to highlight your academic background."
                .to_string(),
        );
    }
    if !lower.contains("skills") {
        out.push(
            "Consider adding a \"Skills\" section to highlight your technical and soft skills."
                .to_string(),
        );
    }
    if action_verb_count(text) < 5 {
        out.push(
            "Use more action verbs (like \"developed,\" \"managed,\" \"created\") to describe your accomplishments."
                .to_string(),
        );
    }

    out.push("Quantify your achievements with numbers and percentages where possible.".to_string());
    out.push("Ensure your contact information is up-to-date and professional.".to_string());
    out
}

pub fn section_recommendations() -> SectionRecommendations {
    SectionRecommendations {
        summary: "Consider tailoring your summary to highlight skills specifically mentioned in the job description. Keep it concise and impactful.".to_string(),
        experience: "Focus on achievements rather than responsibilities. Quantify your impact with metrics where possible.".to_string(),
        skills: "Ensure your skills section includes the key technical skills mentioned in the job description. Organize them by category for better readability.".to_string(),
        education: "List your most recent education first. Include relevant coursework or projects if you're a recent graduate.".to_string(),
    }
}

pub fn overall_suggestions() -> Vec<String> {
    [
        "Tailor your resume specifically to this job description by highlighting relevant experience and skills.",
        "Use industry-specific terminology and keywords found in the job listing.",
        "Ensure your achievements are quantified with numbers when possible (e.g., 'increased sales by 20%').",
        "Keep formatting consistent and easy to scan for an ATS system.",
        "Consider adding a brief professional summary that aligns with the job requirements.",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn percent(value: f64) -> String {
    format!("{}%", value.round() as i64)
}

/// Dashboard metrics. Content and formatting sub-scores are rescaled to percentages.
pub fn metrics(keyword_match_percent: u32, ats_score: u32, text: &str) -> Vec<Metric> {
    vec![
        Metric {
            name: "Keyword Match Rate".to_string(),
            value: format!("{keyword_match_percent}%"),
            description: "Percentage of job keywords found in your resume".to_string(),
        },
        Metric {
            name: "ATS Compatibility".to_string(),
            value: format!("{ats_score}%"),
            description: "How well your resume will perform in Applicant Tracking Systems"
                .to_string(),
        },
        Metric {
            name: "Content Quality".to_string(),
            value: percent(content_score(text) as f64 / 0.3),
            description: "Assessment of your resume's content effectiveness".to_string(),
        },
        Metric {
            name: "Formatting Score".to_string(),
            value: percent(formatting_score(text) as f64 / 0.2),
            description: "How well your resume is structured and formatted".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_resume_gets_every_structural_hint() {
        let recs = generate_recommendations("Jane Doe");
        assert_eq!(recs.len(), 7);
        assert!(recs[0].contains("quite short"));
        assert!(recs.last().unwrap().contains("contact information"));
    }

    #[test]
    fn test_complete_resume_gets_only_general_advice() {
        let mut text = String::from("Experience Education Skills ");
        text.push_str(&"developed managed created ".repeat(70));
        let recs = generate_recommendations(&text);
        assert_eq!(recs.len(), 2);
    }

    #[test]
    fn test_overall_suggestions_are_fixed() {
        assert_eq!(overall_suggestions().len(), 5);
    }

    #[test]
    fn test_metrics_render_percentages() {
        let metrics = metrics(40, 71, "plain");
        let names: Vec<_> = metrics.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Keyword Match Rate",
                "ATS Compatibility",
                "Content Quality",
                "Formatting Score"
            ]
        );
        assert_eq!(metrics[0].value, "40%");
        assert_eq!(metrics[1].value, "71%");
        assert_eq!(metrics[2].value, "50%");
        assert_eq!(metrics[3].value, "75%");
    }
}
