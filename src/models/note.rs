use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub owner: String,
    pub material_id: Option<i64>,
    pub title: String,
    pub content: String,
    pub key_points: Vec<String>,
    pub examples: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNote {
    pub material_id: Option<i64>,
    pub title: String,
    pub content: String,
    pub key_points: Vec<String>,
    pub examples: Vec<String>,
}
