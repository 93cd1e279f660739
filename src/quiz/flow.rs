use tokio::sync::mpsc;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::Question;

use super::session::{QuizPhase, QuizScore, QuizSession};

/// Storage results sent back by the background tasks this module spawns.
#[derive(Debug)]
pub enum QuizEvent {
    QuestionsLoaded {
        quiz_id: i64,
        result: Result<Vec<Question>>,
    },
    AttemptRecorded {
        quiz_id: i64,
        score: QuizScore,
        result: Result<()>,
    },
    QuizDeleted {
        quiz_id: i64,
        result: Result<()>,
    },
}

/// Result of submitting a quiz. The score is always available; `log_error`
/// is set when the attempt could not be recorded.
#[derive(Debug)]
pub struct SubmitOutcome {
    pub quiz_id: i64,
    pub score: QuizScore,
    pub log_error: Option<AppError>,
}

/// What applying a `QuizEvent` did to the session.
#[derive(Debug)]
pub enum QuizUpdate {
    Opened { question_count: usize },
    Submitted(SubmitOutcome),
    Deleted { quiz_id: i64 },
    /// The session moved on before the event arrived.
    Stale,
}

/// Re-fetches the quiz list. Only meaningful while browsing.
pub async fn load_quizzes(session: &mut QuizSession, repo: &Repository, owner: &str) -> Result<()> {
    if session.phase() != QuizPhase::Browsing {
        return Ok(());
    }
    let quizzes = repo
        .get_all_quizzes(owner)
        .await
        .map_err(AppError::into_persistence)?;
    session.set_quizzes(quizzes);
    Ok(())
}

/// Enters `Loading` and fetches the questions in the background. Returns
/// `false` when the session refused to open the quiz.
pub fn open_quiz(
    session: &mut QuizSession,
    repo: &Repository,
    owner: &str,
    quiz_id: i64,
    tx: &mpsc::Sender<QuizEvent>,
) -> bool {
    if !session.open(quiz_id) {
        return false;
    }

    let repo = repo.clone();
    let owner = owner.to_string();
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = repo
            .get_questions(&owner, quiz_id)
            .await
            .map_err(AppError::into_persistence);
        let _ = tx.send(QuizEvent::QuestionsLoaded { quiz_id, result }).await;
    });
    true
}

/// Grades the quiz, enters `Submitting` and records the attempt in the background.
pub fn submit_quiz(
    session: &mut QuizSession,
    repo: &Repository,
    owner: &str,
    tx: &mpsc::Sender<QuizEvent>,
) -> bool {
    let Some(quiz_id) = session.active_quiz().map(|q| q.id) else {
        return false;
    };
    let Some(score) = session.begin_submit() else {
        return false;
    };

    let repo = repo.clone();
    let owner = owner.to_string();
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = repo
            .insert_quiz_attempt(&owner, quiz_id, score.percentage, score.total as u32)
            .await
            .map(|_| ())
            .map_err(AppError::into_persistence);
        let _ = tx
            .send(QuizEvent::AttemptRecorded { quiz_id, score, result })
            .await;
    });
    true
}

/// Marks the confirmed delete as in flight and runs it in the background.
/// Returns `false` when no confirmation was pending.
pub fn delete_quiz(
    session: &mut QuizSession,
    repo: &Repository,
    owner: &str,
    tx: &mpsc::Sender<QuizEvent>,
) -> bool {
    let Some(quiz_id) = session.confirm_delete() else {
        return false;
    };

    let repo = repo.clone();
    let owner = owner.to_string();
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = match repo.delete_quiz(&owner, quiz_id).await {
            Ok(0) => Err(AppError::DeleteFailed("quiz not found".to_string())),
            Ok(_) => Ok(()),
            Err(e) => Err(e.into_delete_failure()),
        };
        let _ = tx.send(QuizEvent::QuizDeleted { quiz_id, result }).await;
    });
    true
}

/// Feeds a finished background result into the session.
pub fn apply_event(session: &mut QuizSession, event: QuizEvent) -> Result<QuizUpdate> {
    match event {
        QuizEvent::QuestionsLoaded { quiz_id, result } => {
            if session.phase() != QuizPhase::Loading
                || session.active_quiz().map(|q| q.id) != Some(quiz_id)
            {
                return Ok(QuizUpdate::Stale);
            }
            let question_count = session.finish_loading(result)?;
            tracing::debug!("Quiz {} loaded with {} playable questions", quiz_id, question_count);
            Ok(QuizUpdate::Opened { question_count })
        }

        QuizEvent::AttemptRecorded { quiz_id, score, result } => {
            if session.phase() != QuizPhase::Submitting {
                return Ok(QuizUpdate::Stale);
            }
            let log_error = result.err();
            if let Some(e) = &log_error {
                tracing::error!("Failed to record quiz attempt: {}", e);
            }
            session.finish_submit();
            Ok(QuizUpdate::Submitted(SubmitOutcome {
                quiz_id,
                score,
                log_error,
            }))
        }

        QuizEvent::QuizDeleted { quiz_id, result } => {
            if session.pending_delete().map(|p| p.id) != Some(quiz_id) {
                return Ok(QuizUpdate::Stale);
            }
            session.finish_delete(result)?;
            tracing::info!("Deleted quiz {}", quiz_id);
            Ok(QuizUpdate::Deleted { quiz_id })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewQuestion, NewQuiz, QuestionType};

    fn q(text: &str, options: &[&str], correct: &str) -> NewQuestion {
        NewQuestion {
            question: text.to_string(),
            question_type: QuestionType::MultipleChoice,
            options: options.iter().map(|s| s.to_string()).collect(),
            correct_answer: correct.to_string(),
            explanation: None,
        }
    }

    async fn seeded(questions: Vec<NewQuestion>) -> (Repository, i64) {
        let repo = Repository::open_in_memory().await.unwrap();
        let quiz_id = repo
            .insert_quiz("alice", NewQuiz { material_id: None, title: "Capitals".into() })
            .await
            .unwrap();
        repo.insert_questions("alice", quiz_id, questions).await.unwrap();
        (repo, quiz_id)
    }

    async fn next_update(
        session: &mut QuizSession,
        rx: &mut mpsc::Receiver<QuizEvent>,
    ) -> Result<QuizUpdate> {
        let event = rx.recv().await.expect("background task dropped its sender");
        apply_event(session, event)
    }

    #[tokio::test]
    async fn three_question_quiz_scores_and_logs_attempt() {
        let (repo, quiz_id) = seeded(vec![
            q("Capital of France?", &["Paris", "Lyon"], "Paris"),
            q("2 + 2?", &["3", "4"], "4"),
            q("Sky is blue?", &["True", "False"], "True"),
        ])
        .await;
        let (tx, mut rx) = mpsc::channel(4);
        let mut session = QuizSession::new();
        load_quizzes(&mut session, &repo, "alice").await.unwrap();

        assert!(open_quiz(&mut session, &repo, "alice", quiz_id, &tx));
        assert_eq!(session.phase(), QuizPhase::Loading);
        assert!(matches!(
            next_update(&mut session, &mut rx).await.unwrap(),
            QuizUpdate::Opened { question_count: 3 }
        ));

        session.select_answer("Paris");
        session.next();
        session.select_answer("3");
        session.next();

        assert!(submit_quiz(&mut session, &repo, "alice", &tx));
        assert_eq!(session.phase(), QuizPhase::Submitting);

        let QuizUpdate::Submitted(outcome) = next_update(&mut session, &mut rx).await.unwrap() else {
            panic!("expected a submitted quiz");
        };
        assert!(outcome.log_error.is_none());
        assert_eq!(outcome.quiz_id, quiz_id);
        assert_eq!(outcome.score.correct, 1);
        assert_eq!(outcome.score.display_percentage(), 33);
        assert_eq!(session.phase(), QuizPhase::Results);

        let items = session.review_items();
        assert_eq!(items[2].answer_label(), "Not answered");
        assert!(!items[2].is_correct);

        let attempts = repo.get_quiz_attempts("alice", quiz_id).await.unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].total_questions, 3);
        assert!((attempts[0].score - outcome.score.percentage).abs() < 1e-9);
    }

    #[tokio::test]
    async fn attempt_log_failure_still_shows_results() {
        let (repo, quiz_id) = seeded(vec![q("Only?", &["A", "B"], "A")]).await;
        let (tx, mut rx) = mpsc::channel(4);
        let mut session = QuizSession::new();
        load_quizzes(&mut session, &repo, "alice").await.unwrap();
        open_quiz(&mut session, &repo, "alice", quiz_id, &tx);
        next_update(&mut session, &mut rx).await.unwrap();
        session.select_answer("A");
        repo.execute_raw("DROP TABLE quiz_attempts;").await.unwrap();

        submit_quiz(&mut session, &repo, "alice", &tx);
        let QuizUpdate::Submitted(outcome) = next_update(&mut session, &mut rx).await.unwrap() else {
            panic!("expected a submitted quiz");
        };

        assert!(matches!(outcome.log_error, Some(AppError::Persistence(_))));
        assert_eq!(outcome.score.display_percentage(), 100);
        assert_eq!(session.phase(), QuizPhase::Results);
    }

    #[tokio::test]
    async fn quiz_without_options_cannot_be_entered() {
        let (repo, quiz_id) = seeded(vec![q("Essay?", &[], "Anything"), q("Other?", &[], "x")]).await;
        let (tx, mut rx) = mpsc::channel(4);
        let mut session = QuizSession::new();
        load_quizzes(&mut session, &repo, "alice").await.unwrap();

        open_quiz(&mut session, &repo, "alice", quiz_id, &tx);
        let err = next_update(&mut session, &mut rx).await.unwrap_err();

        assert!(matches!(err, AppError::NotFoundOrEmpty));
        assert_eq!(session.phase(), QuizPhase::Browsing);
    }

    #[tokio::test]
    async fn delete_stays_in_flight_until_its_result_is_applied() {
        let (repo, quiz_id) = seeded(vec![
            q("1?", &["A"], "A"),
            q("2?", &["A"], "A"),
            q("3?", &["A"], "A"),
        ])
        .await;
        let (tx, mut rx) = mpsc::channel(4);
        let mut session = QuizSession::new();
        load_quizzes(&mut session, &repo, "alice").await.unwrap();

        assert!(session.request_delete(quiz_id));
        assert!(delete_quiz(&mut session, &repo, "alice", &tx));
        assert!(session.pending_delete().is_some_and(|p| p.in_flight));
        assert_eq!(session.quizzes().len(), 1);

        let update = next_update(&mut session, &mut rx).await.unwrap();

        assert!(matches!(update, QuizUpdate::Deleted { quiz_id: id } if id == quiz_id));
        assert!(session.pending_delete().is_none());
        assert!(session.quizzes().is_empty());
        assert_eq!(repo.count_questions(quiz_id).await.unwrap(), 0);
        assert!(repo.get_all_quizzes("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_without_confirmation_does_nothing() {
        let (repo, quiz_id) = seeded(vec![q("1?", &["A"], "A")]).await;
        let (tx, _rx) = mpsc::channel(4);
        let mut session = QuizSession::new();
        load_quizzes(&mut session, &repo, "alice").await.unwrap();

        assert!(!delete_quiz(&mut session, &repo, "alice", &tx));
        assert_eq!(repo.count_questions(quiz_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_delete_keeps_quiz_visible() {
        let (repo, quiz_id) = seeded(vec![q("1?", &["A"], "A")]).await;
        let (tx, mut rx) = mpsc::channel(4);
        let mut session = QuizSession::new();
        load_quizzes(&mut session, &repo, "alice").await.unwrap();
        repo.delete_quiz("alice", quiz_id).await.unwrap();

        session.request_delete(quiz_id);
        delete_quiz(&mut session, &repo, "alice", &tx);
        let err = next_update(&mut session, &mut rx).await.unwrap_err();

        assert!(matches!(err, AppError::DeleteFailed(_)));
        assert_eq!(err.user_message(), "Failed to delete: quiz not found");
        assert_eq!(session.quizzes().len(), 1);
    }

    #[tokio::test]
    async fn results_for_an_abandoned_quiz_are_ignored() {
        let (repo, quiz_id) = seeded(vec![q("1?", &["A"], "A")]).await;
        let mut session = QuizSession::new();
        load_quizzes(&mut session, &repo, "alice").await.unwrap();

        let update = apply_event(
            &mut session,
            QuizEvent::QuestionsLoaded {
                quiz_id,
                result: Ok(Vec::new()),
            },
        )
        .unwrap();

        assert!(matches!(update, QuizUpdate::Stale));
        assert_eq!(session.phase(), QuizPhase::Browsing);
    }
}
