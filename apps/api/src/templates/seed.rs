//! Built-in templates, inserted at startup when `SEED_TEMPLATES` is set.
//! Existing rows with the same name are left alone.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use sqlx::types::Json as SqlJson;
use sqlx::PgPool;
use tracing::info;

use crate::models::template::TemplateStyle;

pub struct SeedTemplate {
    pub name: &'static str,
    pub category: &'static str,
    pub preview_image: &'static str,
    pub style: TemplateStyle,
    pub sections: Value,
}

fn style(font: &str, colors: &[&str], layout: &str) -> TemplateStyle {
    TemplateStyle {
        font_family: Some(font.to_string()),
        colors: colors.iter().map(|c| c.to_string()).collect(),
        layout: Some(layout.to_string()),
    }
}

fn section(id: &str, kind: &str, title: &str, y: u32, height: u32) -> Value {
    let content = if kind == "header" { json!({}) } else { json!([]) };
    json!({
        "id": id,
        "type": kind,
        "title": title,
        "position": {"x": 40, "y": y},
        "size": {"width": 720, "height": height},
        "content": content,
    })
}

pub fn builtin_templates() -> Vec<SeedTemplate> {
    vec![
        SeedTemplate {
            name: "Modern Professional",
            category: "modern",
            preview_image: "/templates/previews/modern-professional.png",
            style: style("Inter", &["#2563eb", "#1e40af", "#111827"], "single-column"),
            sections: json!([
                section("header", "header", "Contact", 40, 120),
                section("experience", "experience", "Work Experience", 180, 360),
                section("education", "education", "Education", 560, 180),
                section("skills", "skills", "Skills", 760, 160),
            ]),
        },
        SeedTemplate {
            name: "Classic",
            category: "professional",
            preview_image: "/templates/previews/classic.png",
            style: style("Georgia", &["#000000", "#374151"], "single-column"),
            sections: json!([
                section("header", "header", "Contact", 40, 100),
                section("experience", "experience", "Experience", 160, 400),
                section("education", "education", "Education", 580, 200),
                section("certifications", "certifications", "Certifications", 800, 140),
            ]),
        },
        SeedTemplate {
            name: "Creative",
            category: "creative",
            preview_image: "/templates/previews/creative.png",
            style: style("Poppins", &["#ec4899", "#be185d", "#111827"], "two-column"),
            sections: json!([
                section("header", "header", "About Me", 40, 140),
                section("projects", "projects", "Portfolio", 200, 320),
                section("experience", "experience", "Experience", 540, 300),
                section("skills", "skills", "Skills", 860, 160),
            ]),
        },
        SeedTemplate {
            name: "Minimal",
            category: "simple",
            preview_image: "/templates/previews/minimal.png",
            style: style("Helvetica", &["#111827"], "single-column"),
            sections: json!([
                section("header", "header", "Contact", 40, 80),
                section("experience", "experience", "Experience", 140, 420),
                section("skills", "skills", "Skills", 580, 120),
            ]),
        },
        SeedTemplate {
            name: "Academic",
            category: "academic",
            preview_image: "/templates/previews/academic.png",
            style: style("Times New Roman", &["#1f2937", "#4b5563"], "single-column"),
            sections: json!([
                section("header", "header", "Contact", 40, 100),
                section("education", "education", "Education", 160, 220),
                section("experience", "experience", "Research Experience", 400, 300),
                section("publications", "custom", "Publications", 720, 200),
                section("certifications", "certifications", "Awards", 940, 120),
            ]),
        },
    ]
}

/// Inserts the built-in templates. Returns how many rows were new.
pub async fn seed_templates(db: &PgPool) -> Result<u64> {
    let mut inserted = 0;
    for template in builtin_templates() {
        let result = sqlx::query(
            r#"
            INSERT INTO templates (name, preview_image, sections, style, category, is_public)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(template.name)
        .bind(template.preview_image)
        .bind(SqlJson(&template.sections))
        .bind(SqlJson(&template.style))
        .bind(template.category)
        .execute(db)
        .await
        .with_context(|| format!("Failed to seed template '{}'", template.name))?;
        inserted += result.rows_affected();
    }
    info!(inserted, "Built-in templates seeded");
    Ok(inserted)
}
