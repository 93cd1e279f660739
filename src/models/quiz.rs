use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::ShortAnswer => "short_answer",
        }
    }

    /// Unknown labels fall back to `MultipleChoice`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim() {
            "true_false" => QuestionType::TrueFalse,
            "short_answer" => QuestionType::ShortAnswer,
            _ => QuestionType::MultipleChoice,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub owner: String,
    pub material_id: Option<i64>,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub material_id: Option<i64>,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub question: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

impl Question {
    /// A question can only be shown in the quiz flow if it has options to pick from.
    pub fn is_playable(&self) -> bool {
        !self.options.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub question: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub owner: String,
    pub quiz_id: i64,
    /// Unrounded percentage.
    pub score: f64,
    pub total_questions: u32,
    pub completed_at: DateTime<Utc>,
}

/// Reads question options from either a JSON array or a JSON object mapping.
/// Non-string entries are skipped; anything else yields no options.
pub fn options_from_value(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Value::Object(map) => map
            .values()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}
