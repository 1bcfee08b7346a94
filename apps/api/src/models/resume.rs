use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::user::UserSummary;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Header,
    Experience,
    Education,
    Skills,
    Projects,
    Certifications,
    Custom,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Visual styling of one section block. Every field is optional; the export
/// renderer falls back to its own defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SectionStyle {
    pub font_family: Option<String>,
    pub font_size: Option<String>,
    pub font_weight: Option<String>,
    pub color: Option<String>,
    pub background_color: Option<String>,
    pub border_color: Option<String>,
    pub border_width: Option<String>,
    pub border_radius: Option<String>,
    pub padding: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    pub id: String,
    #[serde(rename = "type")]
    pub section_type: SectionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<SectionStyle>,
}

impl Section {
    /// Heading used by the renderers: explicit title, else the section type.
    pub fn heading(&self) -> String {
        match &self.title {
            Some(t) if !t.trim().is_empty() => t.clone(),
            _ => {
                let raw = serde_json::to_value(self.section_type)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                let mut chars = raw.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl Default for CanvasSize {
    fn default() -> Self {
        CanvasSize {
            width: 800.0,
            height: 1100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for Margins {
    fn default() -> Self {
        Margins {
            top: 20.0,
            right: 20.0,
            bottom: 20.0,
            left: 20.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PageSettings {
    pub page_size: String,
    pub orientation: Orientation,
    pub margins: Margins,
}

impl Default for PageSettings {
    fn default() -> Self {
        PageSettings {
            page_size: "A4".to_string(),
            orientation: Orientation::Portrait,
            margins: Margins::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub template: String,
    pub sections: Json<Vec<Section>>,
    pub canvas_size: Json<CanvasSize>,
    pub page_settings: Json<PageSettings>,
    pub collaborators: Vec<Uuid>,
    pub last_modified: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A resume with its owner and collaborators resolved to user summaries.
#[derive(Debug, Clone, Serialize)]
pub struct ResumeDetail {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub template: String,
    pub sections: Vec<Section>,
    pub canvas_size: CanvasSize,
    pub page_settings: PageSettings,
    pub owner: Option<UserSummary>,
    pub collaborators: Vec<UserSummary>,
    pub last_modified: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResumeDetail {
    pub fn new(row: ResumeRow, owner: Option<UserSummary>, collaborators: Vec<UserSummary>) -> Self {
        ResumeDetail {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            template: row.template,
            sections: row.sections.0,
            canvas_size: row.canvas_size.0,
            page_settings: row.page_settings.0,
            owner,
            collaborators,
            last_modified: row.last_modified,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub async fn find_by_id(db: &sqlx::PgPool, id: Uuid) -> Result<Option<ResumeRow>, sqlx::Error> {
    sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_section_parses_wire_shape() {
        let section: Section = serde_json::from_value(json!({
            "id": "s1",
            "type": "experience",
            "position": {"x": 10, "y": 20},
            "content": ["Built things"],
            "style": {"font_size": "12px"}
        }))
        .unwrap();
        assert_eq!(section.section_type, SectionType::Experience);
        assert_eq!(section.position, Some(Position { x: 10.0, y: 20.0 }));
        assert_eq!(
            section.style.unwrap().font_size.as_deref(),
            Some("12px")
        );
    }

    #[test]
    fn test_unknown_section_type_is_rejected() {
        let parsed = serde_json::from_value::<Section>(json!({"id": "s", "type": "hobbies"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_page_settings_fill_defaults_from_empty_object() {
        let settings: PageSettings = serde_json::from_value(json!({})).unwrap();
        assert_eq!(settings, PageSettings::default());
        assert_eq!(settings.page_size, "A4");
        assert_eq!(settings.margins.left, 20.0);
    }

    #[test]
    fn test_heading_prefers_title_then_type() {
        let mut section: Section =
            serde_json::from_value(json!({"id": "s", "type": "skills"})).unwrap();
        assert_eq!(section.heading(), "Skills");
        section.title = Some("Toolbox".to_string());
        assert_eq!(section.heading(), "Toolbox");
    }
}
