//! In-process resume rendering: HTML for preview and download, LaTeX source
//! for users who typeset locally. No external renderer is invoked.

use serde_json::Value;

use crate::models::resume::{Orientation, PageSettings, ResumeRow, Section, SectionStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Html,
    Latex,
}

impl ExportFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "html" => Some(ExportFormat::Html),
            "latex" | "tex" => Some(ExportFormat::Latex),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Html => "text/html; charset=utf-8",
            ExportFormat::Latex => "application/x-tex; charset=utf-8",
        }
    }

    pub fn filename(self) -> &'static str {
        match self {
            ExportFormat::Html => "resume.html",
            ExportFormat::Latex => "resume.tex",
        }
    }

    pub fn render(self, resume: &ResumeRow) -> String {
        match self {
            ExportFormat::Html => render_html(resume),
            ExportFormat::Latex => render_latex(resume),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Plain text
// ────────────────────────────────────────────────────────────────────────────

/// Flattens section content to text: strings as-is, arrays one item per line,
/// objects as `key: value` lines.
pub fn content_to_text(content: &Value) -> String {
    match content {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) => content.to_string(),
        Value::Array(items) => items
            .iter()
            .map(content_to_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}: {}", content_to_text(v)))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// The whole resume as text, one block per section.
pub fn resume_text(sections: &[Section]) -> String {
    sections
        .iter()
        .map(|s| format!("{}\n{}", s.heading(), content_to_text(&s.content)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ────────────────────────────────────────────────────────────────────────────
// HTML
// ────────────────────────────────────────────────────────────────────────────

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Inline CSS for a section block, filling unset properties with defaults.
pub fn section_css(style: Option<&SectionStyle>) -> String {
    let default = SectionStyle::default();
    let style = style.unwrap_or(&default);
    let pick = |v: &Option<String>, fallback: &str| {
        v.as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(fallback)
            .to_string()
    };
    let border = match (&style.border_width, &style.border_color) {
        (Some(w), Some(c)) if !w.trim().is_empty() && !c.trim().is_empty() => {
            format!("{w} solid {c}")
        }
        _ => "none".to_string(),
    };
    format!(
        "font-family: {}; font-size: {}; font-weight: {}; color: {}; background-color: {}; border: {}; border-radius: {}; padding: {};",
        pick(&style.font_family, "Arial"),
        pick(&style.font_size, "14px"),
        pick(&style.font_weight, "normal"),
        pick(&style.color, "#000"),
        pick(&style.background_color, "transparent"),
        border,
        pick(&style.border_radius, "0"),
        pick(&style.padding, "0"),
    )
}

pub fn content_to_html(content: &Value) -> String {
    match content {
        Value::Null => String::new(),
        Value::String(s) => escape_html(s),
        Value::Bool(_) | Value::Number(_) => content.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| format!("<div>{}</div>", content_to_html(item)))
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                format!(
                    "<div><strong>{}:</strong> {}</div>",
                    escape_html(k),
                    content_to_html(v)
                )
            })
            .collect(),
    }
}

pub fn render_html(resume: &ResumeRow) -> String {
    let mut body = String::new();
    for section in resume.sections.iter() {
        body.push_str(&format!(
            "<div class=\"section\" style=\"{}\">\n<h2>{}</h2>\n<div class=\"content\">{}</div>\n</div>\n",
            escape_html(&section_css(section.style.as_ref())),
            escape_html(&section.heading()),
            content_to_html(&section.content),
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: Arial, sans-serif; margin: 0; padding: 20px; }}
.page {{ max-width: {width}px; margin: 0 auto; }}
.section {{ margin-bottom: 16px; }}
.section h2 {{ margin: 0 0 8px 0; font-size: 1.2em; }}
</style>
</head>
<body>
<div class="page">
{body}</div>
</body>
</html>
"#,
        title = escape_html(&resume.name),
        width = resume.canvas_size.width,
        body = body,
    )
}

// ────────────────────────────────────────────────────────────────────────────
// LaTeX
// ────────────────────────────────────────────────────────────────────────────

pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

pub fn geometry_options(settings: &PageSettings) -> String {
    let paper = match settings.page_size.trim().to_ascii_lowercase().as_str() {
        "letter" => "letterpaper",
        "legal" => "legalpaper",
        _ => "a4paper",
    };
    let orientation = match settings.orientation {
        Orientation::Portrait => "portrait",
        Orientation::Landscape => "landscape",
    };
    let m = &settings.margins;
    format!(
        "{paper},{orientation},top={}mm,right={}mm,bottom={}mm,left={}mm",
        m.top, m.right, m.bottom, m.left
    )
}

pub fn content_to_latex(content: &Value) -> String {
    match content {
        Value::Null => String::new(),
        Value::String(s) => escape_latex(s),
        Value::Bool(_) | Value::Number(_) => content.to_string(),
        Value::Array(items) if items.is_empty() => String::new(),
        Value::Array(items) => {
            let mut out = String::from("\\begin{itemize}[leftmargin=*]\n");
            for item in items {
                out.push_str(&format!("  \\item {}\n", content_to_latex(item)));
            }
            out.push_str("\\end{itemize}");
            out
        }
        Value::Object(map) if map.is_empty() => String::new(),
        Value::Object(map) => {
            let mut out = String::from("\\begin{description}\n");
            for (k, v) in map {
                out.push_str(&format!(
                    "  \\item[{{{}}}] {}\n",
                    escape_latex(k),
                    content_to_latex(v)
                ));
            }
            out.push_str("\\end{description}");
            out
        }
    }
}

pub fn render_latex(resume: &ResumeRow) -> String {
    let mut out = String::new();
    out.push_str("\\documentclass[11pt]{article}\n");
    out.push_str(&format!(
        "\\usepackage[{}]{{geometry}}\n",
        geometry_options(&resume.page_settings)
    ));
    out.push_str("\\usepackage[T1]{fontenc}\n");
    out.push_str("\\usepackage[utf8]{inputenc}\n");
    out.push_str("\\usepackage{enumitem}\n");
    out.push_str("\\pagestyle{empty}\n\n");
    out.push_str("\\begin{document}\n\n");
    out.push_str(&format!(
        "\\begin{{center}}\n{{\\LARGE \\textbf{{{}}}}}\n\\end{{center}}\n\n",
        escape_latex(&resume.name)
    ));
    for section in resume.sections.iter() {
        out.push_str(&format!("\\section*{{{}}}\n", escape_latex(&section.heading())));
        let body = content_to_latex(&section.content);
        if !body.is_empty() {
            out.push_str(&body);
            out.push('\n');
        }
        out.push('\n');
    }
    out.push_str("\\end{document}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    use crate::resumes::access::tests::resume_with_sections;

    fn section(value: Value) -> Section {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_latex_description_keys_are_brace_grouped() {
        let tex = content_to_latex(&json!({"Skills [core]": "Rust"}));
        assert!(tex.contains("\\item[{Skills [core]}] Rust"));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!(ExportFormat::parse("HTML"), Some(ExportFormat::Html));
        assert_eq!(ExportFormat::parse("latex"), Some(ExportFormat::Latex));
        assert_eq!(ExportFormat::parse("pdf"), None);
        assert_eq!(ExportFormat::Latex.filename(), "resume.tex");
    }

    #[test]
    fn test_default_css_when_unstyled() {
        let css = section_css(None);
        assert!(css.contains("font-family: Arial;"));
        assert!(css.contains("font-size: 14px;"));
        assert!(css.contains("color: #000;"));
        assert!(css.contains("background-color: transparent;"));
        assert!(css.contains("border: none;"));
    }

    #[test]
    fn test_border_needs_width_and_color() {
        let style = SectionStyle {
            border_width: Some("1px".into()),
            border_color: Some("#ccc".into()),
            ..Default::default()
        };
        assert!(section_css(Some(&style)).contains("border: 1px solid #ccc;"));
    }

    #[test]
    fn test_content_html_shapes() {
        assert_eq!(content_to_html(&json!("a < b")), "a &lt; b");
        assert_eq!(
            content_to_html(&json!(["one", "two"])),
            "<div>one</div><div>two</div>"
        );
        assert_eq!(
            content_to_html(&json!({"company": "Acme"})),
            "<div><strong>company:</strong> Acme</div>"
        );
    }

    #[test]
    fn test_html_document_escapes_user_text() {
        let resume = resume_with_sections(
            Uuid::new_v4(),
            vec![],
            vec![section(json!({
                "id": "s1",
                "type": "custom",
                "title": "<script>",
                "content": "Tom & Jerry"
            }))],
        );
        let html = render_html(&resume);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<h2>&lt;script&gt;</h2>"));
        assert!(html.contains("Tom &amp; Jerry"));
        assert_eq!(html.matches("class=\"section\"").count(), 1);
    }

    #[test]
    fn test_latex_escaping() {
        assert_eq!(escape_latex("50% & $5_a"), "50\\% \\& \\$5\\_a");
        assert_eq!(escape_latex("a\\b"), "a\\textbackslash{}b");
        assert_eq!(escape_latex("{x}"), "\\{x\\}");
    }

    #[test]
    fn test_latex_document_structure() {
        let resume = resume_with_sections(
            Uuid::new_v4(),
            vec![],
            vec![
                section(json!({"id": "s1", "type": "skills", "content": ["Rust", "SQL"]})),
                section(json!({"id": "s2", "type": "header", "title": "Contact", "content": {"email": "a@b.c"}})),
            ],
        );
        let tex = render_latex(&resume);
        assert!(tex.contains("\\usepackage[a4paper,portrait,top=20mm,right=20mm,bottom=20mm,left=20mm]{geometry}"));
        assert!(tex.contains("\\section*{Skills}"));
        assert!(tex.contains("\\item Rust"));
        assert!(tex.contains("\\begin{description}"));
        assert!(tex.contains("\\item[{email}] a@b.c"));
        assert!(tex.trim_end().ends_with("\\end{document}"));
    }

    #[test]
    fn test_resume_text_flattens_sections() {
        let sections = vec![
            section(json!({"id": "s1", "type": "experience", "content": [{"role": "Engineer"}, "Led 5 projects"]})),
        ];
        let text = resume_text(&sections);
        assert_eq!(text, "Experience\nrole: Engineer\nLed 5 projects");
    }
}
