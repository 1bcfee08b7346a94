// Prompts for the analyzer and job recommendation flows.

pub fn resume_feedback_prompt(resume_text: &str) -> String {
    format!(
        r#"Analyze this resume and provide detailed feedback:
1. Overall Structure and Format
2. Content Quality
3. Skills Assessment
4. Experience Description Quality
5. Areas for Improvement
6. ATS Optimization Suggestions

Resume Text:
{resume_text}"#
    )
}

pub fn job_match_prompt(resume_text: &str, job_description: &str) -> String {
    format!(
        r#"Analyze how well this resume matches the job description and provide detailed feedback:
1. Overall Match Score (0-100)
2. Key Skills Match
3. Experience Relevance
4. Missing Keywords/Skills
5. Suggested Improvements
6. Competitive Advantages

Resume:
{resume_text}

Job Description:
{job_description}"#
    )
}

/// Asks for a JSON object shaped like `SkillMatch`.
pub fn skill_match_prompt(resume_text: &str, job_description: &str) -> String {
    format!(
        r#"Analyze the following resume and job description for compatibility.
Provide:
1. An overall match score (0-100)
2. The skills found in both
3. The skills the job description requires that are missing from the resume
4. Specific recommendations for improving the match

Resume:
{resume_text}

Job Description:
{job_description}

Respond with a JSON object of exactly this shape:
{{
  "matchScore": number,
  "matchedSkills": string[],
  "missingSkills": string[],
  "recommendations": string
}}"#
    )
}

pub fn keywords_prompt(resume_text: &str) -> String {
    format!(
        "Extract the top 10 professional skills and keywords from this resume. \
         Return them as a comma separated list with no numbering or extra text.\n\n\
         Resume:\n{resume_text}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_embed_inputs() {
        assert!(resume_feedback_prompt("RESUME").ends_with("RESUME"));
        let p = job_match_prompt("RESUME", "JOB");
        assert!(p.contains("Resume:\nRESUME") && p.contains("Job Description:\nJOB"));
        assert!(skill_match_prompt("R", "J").contains("\"matchScore\": number"));
        assert!(keywords_prompt("R").contains("comma separated"));
    }
}
