use crate::ai::{ContentGenerator, GeneratedContent, GenerationInput};
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{NewFlashcard, NewMaterial, NewNote, NewQuestion, NewQuiz};

/// What one successful fan-out wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    pub material_id: i64,
    pub title: String,
    pub note_id: Option<i64>,
    pub flashcard_count: usize,
    pub quiz_id: Option<i64>,
    pub question_count: usize,
}

/// Validates the input, asks the generator for content and persists it.
/// Nothing is written unless generation succeeded.
pub async fn generate_material(
    generator: &dyn ContentGenerator,
    repo: &Repository,
    owner: &str,
    input: GenerationInput,
) -> Result<FanoutReport> {
    input.validate()?;
    let content = generator.generate(&input).await?;
    persist_generation(repo, owner, &input, content).await
}

/// Writes the material and everything derived from it, one step at a time.
///
/// A failing step aborts the remaining ones. Steps that already committed
/// stay committed, so a material can be left without its notes, flashcards
/// or quiz.
pub async fn persist_generation(
    repo: &Repository,
    owner: &str,
    input: &GenerationInput,
    content: GeneratedContent,
) -> Result<FanoutReport> {
    let GeneratedContent {
        title: generated_title,
        summary,
        flashcards,
        key_points,
        examples,
        quiz_questions,
    } = content;

    let (title, raw_content) = match input {
        GenerationInput::Paste { title, content, .. } => (title.trim().to_string(), content.clone()),
        GenerationInput::Topic { topic } => (
            generated_title.unwrap_or_else(|| topic.trim().to_string()),
            topic.trim().to_string(),
        ),
    };

    let material_id = repo
        .insert_material(
            owner,
            NewMaterial {
                title: title.clone(),
                content: raw_content,
                source: input.source(),
                summary: Some(summary.clone()),
            },
        )
        .await
        .map_err(step_failed("material"))?;

    let mut report = FanoutReport {
        material_id,
        title: title.clone(),
        note_id: None,
        flashcard_count: 0,
        quiz_id: None,
        question_count: 0,
    };

    if !key_points.is_empty() || !examples.is_empty() {
        let note_id = repo
            .insert_note(
                owner,
                NewNote {
                    material_id: Some(material_id),
                    title: title.clone(),
                    content: summary,
                    key_points,
                    examples,
                },
            )
            .await
            .map_err(step_failed("note"))?;
        report.note_id = Some(note_id);
    }

    if !flashcards.is_empty() {
        let cards = flashcards
            .into_iter()
            .map(|card| NewFlashcard {
                material_id: Some(material_id),
                question: card.question,
                answer: card.answer,
                difficulty: card.difficulty,
            })
            .collect();
        report.flashcard_count = repo
            .insert_flashcards(owner, cards)
            .await
            .map_err(step_failed("flashcards"))?;
    }

    if !quiz_questions.is_empty() {
        let quiz_id = repo
            .insert_quiz(
                owner,
                NewQuiz {
                    material_id: Some(material_id),
                    title: format!("{title} Quiz"),
                },
            )
            .await
            .map_err(step_failed("quiz"))?;
        report.quiz_id = Some(quiz_id);

        let questions = quiz_questions
            .into_iter()
            .map(|q| NewQuestion {
                question: q.question,
                question_type: q.question_type,
                options: q.options,
                correct_answer: q.correct_answer,
                explanation: q.explanation,
            })
            .collect();
        report.question_count = repo
            .insert_questions(owner, quiz_id, questions)
            .await
            .map_err(step_failed("questions"))?;
    }

    tracing::info!(
        "Saved material {} with {} flashcards and {} questions",
        material_id,
        report.flashcard_count,
        report.question_count
    );

    Ok(report)
}

fn step_failed(step: &'static str) -> impl Fn(AppError) -> AppError {
    move |e| {
        tracing::error!("Fan-out step '{}' failed: {}", step, e);
        match e.into_persistence() {
            AppError::Persistence(msg) => AppError::Persistence(format!("{step}: {msg}")),
            other => AppError::Persistence(format!("{step}: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::{osmosis, StubGenerator, StubReply};
    use crate::models::SourceKind;

    #[tokio::test]
    async fn topic_generation_fans_out_into_every_table() {
        let repo = Repository::open_in_memory().await.unwrap();
        let generator = StubGenerator::new(StubReply::Content(osmosis()));

        let report = generate_material(
            &generator,
            &repo,
            "alice",
            GenerationInput::Topic { topic: "Osmosis".into() },
        )
        .await
        .unwrap();

        let materials = repo.get_all_materials("alice").await.unwrap();
        assert_eq!(materials.len(), 1);
        assert_eq!(materials[0].title, "Osmosis");
        assert_eq!(materials[0].source, SourceKind::AiGenerated);

        let notes = repo.get_all_notes("alice").await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].material_id, Some(report.material_id));
        assert_eq!(notes[0].key_points.len(), 8);
        assert_eq!(notes[0].examples.len(), 4);

        let cards = repo
            .get_flashcards_for_material("alice", report.material_id)
            .await
            .unwrap();
        assert_eq!(cards.len(), 5);

        let quizzes = repo.get_all_quizzes("alice").await.unwrap();
        assert_eq!(quizzes.len(), 1);
        assert_eq!(quizzes[0].title, "Osmosis Quiz");
        assert_eq!(quizzes[0].material_id, Some(report.material_id));
        let questions = repo.get_questions("alice", quizzes[0].id).await.unwrap();
        assert_eq!(questions.len(), 8);

        assert_eq!(report.flashcard_count, 5);
        assert_eq!(report.question_count, 8);
        assert!(report.note_id.is_some());
    }

    #[tokio::test]
    async fn rate_limited_generation_writes_nothing() {
        let repo = Repository::open_in_memory().await.unwrap();
        let generator = StubGenerator::new(StubReply::Fail(|| AppError::RateLimited));

        let err = generate_material(
            &generator,
            &repo,
            "alice",
            GenerationInput::Topic { topic: "Osmosis".into() },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::RateLimited));
        assert_eq!(
            err.user_message(),
            "Rate limit exceeded. Please try again in a moment."
        );
        assert!(repo.get_all_materials("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_input_skips_the_generator() {
        let repo = Repository::open_in_memory().await.unwrap();
        let generator = StubGenerator::new(StubReply::Content(osmosis()));

        let err = generate_material(
            &generator,
            &repo,
            "alice",
            GenerationInput::Paste {
                title: "Notes".into(),
                content: "   ".into(),
                source: SourceKind::Pasted,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn pasted_material_keeps_raw_text_and_skips_empty_sections() {
        let repo = Repository::open_in_memory().await.unwrap();
        let content = GeneratedContent {
            summary: "Short".into(),
            ..GeneratedContent::default()
        };
        let input = GenerationInput::Paste {
            title: " Cell biology ".into(),
            content: "Mitochondria make ATP.".into(),
            source: SourceKind::Pasted,
        };

        let report = persist_generation(&repo, "alice", &input, content).await.unwrap();

        let materials = repo.get_all_materials("alice").await.unwrap();
        assert_eq!(materials[0].title, "Cell biology");
        assert_eq!(materials[0].content, "Mitochondria make ATP.");
        assert_eq!(materials[0].summary.as_deref(), Some("Short"));
        assert_eq!(report.note_id, None);
        assert_eq!(report.quiz_id, None);
        assert!(repo.get_all_notes("alice").await.unwrap().is_empty());
        assert!(repo.get_all_quizzes("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_step_leaves_earlier_rows_in_place() {
        let repo = Repository::open_in_memory().await.unwrap();
        repo.execute_raw("DROP TABLE flashcards;").await.unwrap();
        let input = GenerationInput::Topic { topic: "Osmosis".into() };

        let err = persist_generation(&repo, "alice", &input, osmosis())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Persistence(ref msg) if msg.starts_with("flashcards")));
        assert_eq!(repo.get_all_materials("alice").await.unwrap().len(), 1);
        assert_eq!(repo.get_all_notes("alice").await.unwrap().len(), 1);
        assert!(repo.get_all_quizzes("alice").await.unwrap().is_empty());
    }
}
