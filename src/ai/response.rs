use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{options_from_value, Difficulty, QuestionType};

/// Study content produced by one generation call, normalized and ready to persist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedContent {
    /// Only present for topic requests.
    pub title: Option<String>,
    pub summary: String,
    pub flashcards: Vec<GeneratedFlashcard>,
    pub key_points: Vec<String>,
    pub examples: Vec<String>,
    pub quiz_questions: Vec<GeneratedQuestion>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFlashcard {
    pub question: String,
    pub answer: String,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedQuestion {
    pub question: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawContent {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    flashcards: Vec<RawFlashcard>,
    #[serde(default)]
    key_points: Vec<String>,
    #[serde(default)]
    examples: Vec<String>,
    #[serde(default)]
    quiz_questions: Vec<RawQuestion>,
}

#[derive(Debug, Deserialize)]
struct RawFlashcard {
    question: String,
    answer: String,
    #[serde(default)]
    difficulty: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    question: String,
    #[serde(rename = "type", default)]
    question_type: Option<String>,
    #[serde(default)]
    options: Value,
    correct_answer: Value,
    #[serde(default)]
    explanation: Option<String>,
}

fn fence_open() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^```[A-Za-z0-9_-]*[ \t]*\r?\n?").expect("valid regex"))
}

fn fence_close() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\r?\n?```$").expect("valid regex"))
}

/// Removes a leading ```` ``` ```` / ```` ```json ```` fence and a trailing
/// ```` ``` ```` fence if present.
pub fn strip_code_fence(raw: &str) -> &str {
    let text = raw.trim();
    let start = fence_open().find(text).map(|m| m.end()).unwrap_or(0);
    let text = &text[start..];
    let end = fence_close()
        .find(text)
        .map(|m| m.start())
        .unwrap_or(text.len());
    text[..end].trim()
}

fn answer_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parses the completion text into [`GeneratedContent`].
pub fn parse_generated_content(raw: &str) -> Result<GeneratedContent> {
    let json = strip_code_fence(raw);
    let parsed: RawContent = serde_json::from_str(json).map_err(|e| {
        tracing::warn!("Unparsable generation response: {}", e);
        AppError::GenerationFormat(e.to_string())
    })?;

    let flashcards = parsed
        .flashcards
        .into_iter()
        .map(|card| GeneratedFlashcard {
            question: card.question,
            answer: card.answer,
            difficulty: card
                .difficulty
                .as_deref()
                .map(Difficulty::parse_lenient)
                .unwrap_or_default(),
        })
        .collect();

    let quiz_questions = parsed
        .quiz_questions
        .into_iter()
        .map(|q| GeneratedQuestion {
            question: q.question,
            question_type: q
                .question_type
                .as_deref()
                .map(QuestionType::parse_lenient)
                .unwrap_or_default(),
            options: options_from_value(&q.options),
            correct_answer: answer_text(q.correct_answer),
            explanation: q.explanation.filter(|e| !e.trim().is_empty()),
        })
        .collect();

    Ok(GeneratedContent {
        title: parsed.title.filter(|t| !t.trim().is_empty()),
        summary: parsed.summary,
        flashcards,
        key_points: parsed.key_points,
        examples: parsed.examples,
        quiz_questions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "summary": "Water crosses membranes.",
        "flashcards": [
            {"question": "What is osmosis?", "answer": "Diffusion of water", "difficulty": "easy"},
            {"question": "Hypertonic?", "answer": "Higher solute"}
        ],
        "key_points": ["Semi-permeable membrane"],
        "examples": ["Raisins swell in water"],
        "quiz_questions": [
            {"question": "Water moves toward?", "type": "multiple_choice",
             "options": ["Low solute", "High solute"], "correct_answer": "High solute",
             "explanation": "Water follows solute."},
            {"question": "Osmosis needs ATP", "type": "true_false",
             "options": ["True", "False"], "correct_answer": false}
        ]
    }"#;

    #[test]
    fn labeled_fence_is_stripped() {
        let wrapped = format!("```json\n{BODY}\n```");
        let content = parse_generated_content(&wrapped).unwrap();
        assert_eq!(content.summary, "Water crosses membranes.");
        assert_eq!(content.flashcards.len(), 2);
    }

    #[test]
    fn unlabeled_fence_is_stripped() {
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn missing_difficulty_defaults_to_medium() {
        let content = parse_generated_content(BODY).unwrap();
        assert_eq!(content.flashcards[0].difficulty, Difficulty::Easy);
        assert_eq!(content.flashcards[1].difficulty, Difficulty::Medium);
    }

    #[test]
    fn boolean_answers_match_true_false_options() {
        let content = parse_generated_content(BODY).unwrap();
        let q = &content.quiz_questions[1];
        assert_eq!(q.question_type, QuestionType::TrueFalse);
        assert_eq!(q.correct_answer, "False");
        assert!(q.options.contains(&q.correct_answer));
        assert_eq!(q.explanation, None);
    }

    #[test]
    fn missing_sections_become_empty() {
        let content = parse_generated_content(r#"{"summary": "Just a summary"}"#).unwrap();
        assert!(content.flashcards.is_empty());
        assert!(content.key_points.is_empty());
        assert!(content.quiz_questions.is_empty());
        assert_eq!(content.title, None);
    }

    #[test]
    fn invalid_json_is_a_format_error() {
        let err = parse_generated_content("Sure! Here are your notes.").unwrap_err();
        assert!(matches!(err, AppError::GenerationFormat(_)));

        let err = parse_generated_content(r#"{"flashcards": [{"question": "no answer"}]}"#)
            .unwrap_err();
        assert!(matches!(err, AppError::GenerationFormat(_)));

        let err = parse_generated_content("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, AppError::GenerationFormat(_)));
    }
}
