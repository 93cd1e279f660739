use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::{BoxFuture, FutureExt};

use crate::error::{AppError, Result};
use crate::models::{Difficulty, QuestionType};

use super::response::{GeneratedFlashcard, GeneratedQuestion};
use super::{ContentGenerator, GeneratedContent, GenerationInput};

pub enum StubReply {
    Content(GeneratedContent),
    Fail(fn() -> AppError),
}

/// Generator that answers every request with a canned reply.
pub struct StubGenerator {
    reply: StubReply,
    calls: AtomicUsize,
}

impl StubGenerator {
    pub fn new(reply: StubReply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ContentGenerator for StubGenerator {
    fn generate<'a>(&'a self, _input: &'a GenerationInput) -> BoxFuture<'a, Result<GeneratedContent>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = match &self.reply {
            StubReply::Content(content) => Ok(content.clone()),
            StubReply::Fail(make) => Err(make()),
        };
        async move { result }.boxed()
    }
}

/// Topic result with 5 flashcards, 8 key points, 4 examples and 8 questions.
pub fn osmosis() -> GeneratedContent {
    GeneratedContent {
        title: Some("Osmosis".into()),
        summary: "Water moves across a semi-permeable membrane.".into(),
        flashcards: (0..5)
            .map(|i| GeneratedFlashcard {
                question: format!("Card {i}?"),
                answer: format!("Answer {i}"),
                difficulty: Difficulty::Medium,
            })
            .collect(),
        key_points: (0..8).map(|i| format!("Point {i}")).collect(),
        examples: (0..4).map(|i| format!("Example {i}")).collect(),
        quiz_questions: (0..8)
            .map(|i| GeneratedQuestion {
                question: format!("Question {i}?"),
                question_type: QuestionType::MultipleChoice,
                options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                correct_answer: "A".into(),
                explanation: Some("Because".into()),
            })
            .collect(),
    }
}
