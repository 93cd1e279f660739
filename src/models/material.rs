use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Uploaded,
    Pasted,
    AiGenerated,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Uploaded => "uploaded",
            SourceKind::Pasted => "pasted",
            SourceKind::AiGenerated => "ai_generated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploaded" => Some(SourceKind::Uploaded),
            "pasted" => Some(SourceKind::Pasted),
            "ai_generated" => Some(SourceKind::AiGenerated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub id: i64,
    pub owner: String,
    pub title: String,
    pub content: String,
    pub source: SourceKind,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMaterial {
    pub title: String,
    pub content: String,
    pub source: SourceKind,
    pub summary: Option<String>,
}
