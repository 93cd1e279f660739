use std::collections::HashMap;

use crate::error::{AppError, Result};
use crate::models::{Question, Quiz};

pub const NOT_ANSWERED: &str = "Not answered";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuizPhase {
    #[default]
    Browsing,
    Loading,
    InProgress,
    Submitting,
    Results,
    Reviewing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuizScore {
    pub correct: usize,
    pub total: usize,
    /// Unrounded; round only for display.
    pub percentage: f64,
}

impl QuizScore {
    /// Counts questions whose stored answer equals `correct_answer` exactly.
    pub fn compute(questions: &[Question], answers: &HashMap<i64, String>) -> Self {
        let correct = questions
            .iter()
            .filter(|q| answers.get(&q.id).is_some_and(|a| *a == q.correct_answer))
            .count();
        let total = questions.len();
        let percentage = if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64 * 100.0
        };
        Self {
            correct,
            total,
            percentage,
        }
    }

    pub fn display_percentage(&self) -> u32 {
        self.percentage.round() as u32
    }
}

/// A delete awaiting confirmation; `in_flight` once the user confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingDelete {
    pub id: i64,
    pub in_flight: bool,
}

#[derive(Debug, Clone)]
pub struct ReviewItem<'a> {
    pub question: &'a Question,
    pub answer: Option<&'a str>,
    pub is_correct: bool,
}

impl ReviewItem<'_> {
    pub fn answer_label(&self) -> &str {
        self.answer.unwrap_or(NOT_ANSWERED)
    }
}

/// State of the quiz view: browsing the quiz list, taking one quiz, and
/// reviewing its results.
#[derive(Debug, Default)]
pub struct QuizSession {
    phase: QuizPhase,
    quizzes: Vec<Quiz>,
    selected: usize,
    active_quiz: Option<Quiz>,
    questions: Vec<Question>,
    current_index: usize,
    answers: HashMap<i64, String>,
    score: Option<QuizScore>,
    review_index: usize,
    pending_delete: Option<PendingDelete>,
}

impl QuizSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    // Browsing

    pub fn quizzes(&self) -> &[Quiz] {
        &self.quizzes
    }

    pub fn set_quizzes(&mut self, quizzes: Vec<Quiz>) {
        self.quizzes = quizzes;
        self.clamp_selection();
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_quiz(&self) -> Option<&Quiz> {
        self.quizzes.get(self.selected)
    }

    pub fn select_previous_quiz(&mut self) {
        if self.phase == QuizPhase::Browsing && self.pending_delete.is_none() {
            self.selected = self.selected.saturating_sub(1);
        }
    }

    pub fn select_next_quiz(&mut self) {
        if self.phase == QuizPhase::Browsing
            && self.pending_delete.is_none()
            && self.selected + 1 < self.quizzes.len()
        {
            self.selected += 1;
        }
    }

    fn clamp_selection(&mut self) {
        if self.selected >= self.quizzes.len() {
            self.selected = self.quizzes.len().saturating_sub(1);
        }
    }

    /// Starts loading a quiz. Refused outside `Browsing` or while a delete
    /// confirmation is open.
    pub fn open(&mut self, quiz_id: i64) -> bool {
        if self.phase != QuizPhase::Browsing || self.pending_delete.is_some() {
            return false;
        }
        let Some(quiz) = self.quizzes.iter().find(|q| q.id == quiz_id).cloned() else {
            return false;
        };
        self.clear_attempt();
        self.active_quiz = Some(quiz);
        self.phase = QuizPhase::Loading;
        true
    }

    /// Receives the fetched questions. Only playable questions are kept; a
    /// quiz with none left goes back to `Browsing` with `NotFoundOrEmpty`.
    pub fn finish_loading(&mut self, fetched: Result<Vec<Question>>) -> Result<usize> {
        if self.phase != QuizPhase::Loading {
            return Ok(0);
        }
        let questions = match fetched {
            Ok(questions) => questions,
            Err(e) => {
                self.reset_to_browsing();
                return Err(e);
            }
        };

        let total = questions.len();
        let playable: Vec<Question> = questions.into_iter().filter(Question::is_playable).collect();
        if playable.len() < total {
            tracing::debug!("Dropped {} questions without options", total - playable.len());
        }
        if playable.is_empty() {
            self.reset_to_browsing();
            return Err(AppError::NotFoundOrEmpty);
        }

        let count = playable.len();
        self.questions = playable;
        self.current_index = 0;
        self.phase = QuizPhase::InProgress;
        Ok(count)
    }

    // In progress

    pub fn active_quiz(&self) -> Option<&Quiz> {
        self.active_quiz.as_ref()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    pub fn current_answer(&self) -> Option<&str> {
        self.current_question()
            .and_then(|q| self.answers.get(&q.id))
            .map(String::as_str)
    }

    pub fn answers(&self) -> &HashMap<i64, String> {
        &self.answers
    }

    pub fn is_last_question(&self) -> bool {
        !self.questions.is_empty() && self.current_index == self.questions.len() - 1
    }

    pub fn next(&mut self) -> bool {
        if self.phase != QuizPhase::InProgress || self.is_last_question() {
            return false;
        }
        self.current_index += 1;
        true
    }

    pub fn previous(&mut self) -> bool {
        if self.phase != QuizPhase::InProgress || self.current_index == 0 {
            return false;
        }
        self.current_index -= 1;
        true
    }

    pub fn select_answer(&mut self, answer: impl Into<String>) -> bool {
        if self.phase != QuizPhase::InProgress {
            return false;
        }
        let Some(id) = self.current_question().map(|q| q.id) else {
            return false;
        };
        self.answers.insert(id, answer.into());
        true
    }

    /// Picks the option at `index` for the current question.
    pub fn select_option(&mut self, index: usize) -> bool {
        let Some(option) = self
            .current_question()
            .and_then(|q| q.options.get(index))
            .cloned()
        else {
            return false;
        };
        self.select_answer(option)
    }

    /// Grades the attempt. Only available on the last question.
    pub fn begin_submit(&mut self) -> Option<QuizScore> {
        if self.phase != QuizPhase::InProgress || !self.is_last_question() {
            return None;
        }
        let score = QuizScore::compute(&self.questions, &self.answers);
        self.score = Some(score);
        self.phase = QuizPhase::Submitting;
        Some(score)
    }

    /// Shows results whether or not the attempt could be logged.
    pub fn finish_submit(&mut self) {
        if self.phase == QuizPhase::Submitting {
            self.phase = QuizPhase::Results;
        }
    }

    // Results

    pub fn score(&self) -> Option<QuizScore> {
        self.score
    }

    pub fn review(&mut self) -> bool {
        if self.phase != QuizPhase::Results {
            return false;
        }
        self.review_index = 0;
        self.phase = QuizPhase::Reviewing;
        true
    }

    pub fn close_review(&mut self) -> bool {
        if self.phase != QuizPhase::Reviewing {
            return false;
        }
        self.phase = QuizPhase::Results;
        true
    }

    pub fn review_index(&self) -> usize {
        self.review_index
    }

    pub fn review_next(&mut self) -> bool {
        if self.phase != QuizPhase::Reviewing || self.review_index + 1 >= self.questions.len() {
            return false;
        }
        self.review_index += 1;
        true
    }

    pub fn review_previous(&mut self) -> bool {
        if self.phase != QuizPhase::Reviewing || self.review_index == 0 {
            return false;
        }
        self.review_index -= 1;
        true
    }

    pub fn review_items(&self) -> Vec<ReviewItem<'_>> {
        self.questions
            .iter()
            .map(|question| {
                let answer = self.answers.get(&question.id).map(String::as_str);
                ReviewItem {
                    question,
                    answer,
                    is_correct: answer == Some(question.correct_answer.as_str()),
                }
            })
            .collect()
    }

    pub fn current_review_item(&self) -> Option<ReviewItem<'_>> {
        self.review_items().into_iter().nth(self.review_index)
    }

    /// Leaves a quiz, discarding questions and answers without asking.
    pub fn reset(&mut self) -> bool {
        match self.phase {
            QuizPhase::InProgress | QuizPhase::Results | QuizPhase::Reviewing => {
                self.reset_to_browsing();
                true
            }
            _ => false,
        }
    }

    fn reset_to_browsing(&mut self) {
        self.clear_attempt();
        self.active_quiz = None;
        self.phase = QuizPhase::Browsing;
    }

    fn clear_attempt(&mut self) {
        self.questions.clear();
        self.answers.clear();
        self.current_index = 0;
        self.review_index = 0;
        self.score = None;
    }

    // Deletion

    pub fn pending_delete(&self) -> Option<PendingDelete> {
        self.pending_delete
    }

    pub fn request_delete(&mut self, quiz_id: i64) -> bool {
        if self.phase != QuizPhase::Browsing
            || self.pending_delete.is_some()
            || !self.quizzes.iter().any(|q| q.id == quiz_id)
        {
            return false;
        }
        self.pending_delete = Some(PendingDelete {
            id: quiz_id,
            in_flight: false,
        });
        true
    }

    pub fn cancel_delete(&mut self) -> bool {
        match self.pending_delete {
            Some(pending) if !pending.in_flight => {
                self.pending_delete = None;
                true
            }
            _ => false,
        }
    }

    /// Marks the pending delete as in flight and returns the quiz id to delete.
    pub fn confirm_delete(&mut self) -> Option<i64> {
        let pending = self.pending_delete.as_mut()?;
        if pending.in_flight {
            return None;
        }
        pending.in_flight = true;
        Some(pending.id)
    }

    /// Drops the quiz from the visible list on success; keeps it on failure.
    pub fn finish_delete(&mut self, result: Result<()>) -> Result<()> {
        let Some(pending) = self.pending_delete.take() else {
            return result;
        };
        result?;
        self.quizzes.retain(|q| q.id != pending.id);
        self.clamp_selection();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionType;
    use chrono::Utc;

    fn quiz(id: i64) -> Quiz {
        Quiz {
            id,
            owner: "alice".into(),
            material_id: None,
            title: format!("Quiz {id}"),
            created_at: Utc::now(),
        }
    }

    fn question(id: i64, options: &[&str], correct: &str) -> Question {
        Question {
            id,
            quiz_id: 1,
            question: format!("Question {id}"),
            question_type: QuestionType::MultipleChoice,
            options: options.iter().map(|s| s.to_string()).collect(),
            correct_answer: correct.to_string(),
            explanation: Some(format!("Explanation {id}")),
        }
    }

    fn three_questions() -> Vec<Question> {
        vec![
            question(1, &["Paris", "Rome"], "Paris"),
            question(2, &["2", "4"], "4"),
            question(3, &["Yes", "No"], "Yes"),
        ]
    }

    fn in_progress(questions: Vec<Question>) -> QuizSession {
        let mut session = QuizSession::new();
        session.set_quizzes(vec![quiz(1), quiz(2)]);
        assert!(session.open(1));
        session.finish_loading(Ok(questions)).unwrap();
        session
    }

    #[test]
    fn loading_drops_questions_without_options() {
        let mut session = QuizSession::new();
        session.set_quizzes(vec![quiz(1)]);
        session.open(1);

        let count = session
            .finish_loading(Ok(vec![
                question(1, &[], "A"),
                question(2, &["A", "B"], "A"),
                question(3, &[], "B"),
            ]))
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(session.phase(), QuizPhase::InProgress);
        assert_eq!(session.questions()[0].id, 2);
    }

    #[test]
    fn quiz_without_playable_questions_returns_to_browsing() {
        let mut session = QuizSession::new();
        session.set_quizzes(vec![quiz(1)]);
        session.open(1);

        let err = session
            .finish_loading(Ok(vec![question(1, &[], "A"), question(2, &[], "B")]))
            .unwrap_err();

        assert!(matches!(err, AppError::NotFoundOrEmpty));
        assert_eq!(session.phase(), QuizPhase::Browsing);
        assert!(session.questions().is_empty());
        assert!(session.active_quiz().is_none());
    }

    #[test]
    fn failed_fetch_returns_to_browsing() {
        let mut session = QuizSession::new();
        session.set_quizzes(vec![quiz(1)]);
        session.open(1);

        let err = session
            .finish_loading(Err(AppError::Persistence("offline".into())))
            .unwrap_err();

        assert!(matches!(err, AppError::Persistence(_)));
        assert_eq!(session.phase(), QuizPhase::Browsing);
    }

    #[test]
    fn navigation_is_clamped_at_both_ends() {
        let mut session = in_progress(three_questions());

        assert!(!session.previous());
        assert_eq!(session.current_index(), 0);

        assert!(session.next());
        assert!(session.next());
        assert!(session.is_last_question());
        assert!(!session.next());
        assert_eq!(session.current_index(), 2);
    }

    #[test]
    fn answers_persist_across_navigation() {
        let mut session = in_progress(three_questions());

        session.select_answer("Rome");
        session.next();
        assert_eq!(session.current_answer(), None);
        session.previous();
        assert_eq!(session.current_answer(), Some("Rome"));

        session.select_option(0);
        assert_eq!(session.current_answer(), Some("Paris"));
        assert_eq!(session.answers().len(), 1);
    }

    #[test]
    fn submit_is_only_available_on_the_last_question() {
        let mut session = in_progress(three_questions());

        assert!(session.begin_submit().is_none());
        assert_eq!(session.phase(), QuizPhase::InProgress);

        session.next();
        session.next();
        assert!(session.begin_submit().is_some());
        assert_eq!(session.phase(), QuizPhase::Submitting);
    }

    #[test]
    fn grading_counts_exact_matches_and_reviews_unanswered() {
        let mut session = in_progress(three_questions());
        session.select_answer("Paris");
        session.next();
        session.select_answer("2");
        session.next();

        let score = session.begin_submit().unwrap();
        session.finish_submit();

        assert_eq!(score.correct, 1);
        assert_eq!(score.total, 3);
        assert!((score.percentage - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(score.display_percentage(), 33);
        assert_eq!(session.phase(), QuizPhase::Results);

        assert!(session.review());
        let items = session.review_items();
        assert!(items[0].is_correct);
        assert!(!items[1].is_correct);
        assert_eq!(items[1].answer_label(), "2");
        assert_eq!(items[2].answer_label(), NOT_ANSWERED);
        assert!(!items[2].is_correct);
        assert_eq!(items[2].question.explanation.as_deref(), Some("Explanation 3"));
    }

    #[test]
    fn grading_is_case_sensitive() {
        let mut session = in_progress(vec![question(1, &["paris", "Paris"], "Paris")]);
        session.select_answer("paris");

        let score = session.begin_submit().unwrap();

        assert_eq!(score.correct, 0);
        assert_eq!(score.display_percentage(), 0);
    }

    #[test]
    fn answer_outside_options_is_never_correct() {
        let mut session = in_progress(vec![question(1, &["A", "B"], "C")]);
        session.select_option(0);
        assert_eq!(session.begin_submit().unwrap().correct, 0);
    }

    #[test]
    fn answers_are_frozen_after_submit() {
        let mut session = in_progress(vec![question(1, &["A", "B"], "A")]);
        session.select_answer("B");
        session.begin_submit();
        session.finish_submit();
        session.review();

        assert!(!session.select_answer("A"));
        assert_eq!(session.answers().get(&1).map(String::as_str), Some("B"));
    }

    #[test]
    fn review_navigation_is_clamped() {
        let mut session = in_progress(three_questions());
        session.next();
        session.next();
        session.begin_submit();
        session.finish_submit();
        session.review();

        assert!(!session.review_previous());
        assert!(session.review_next());
        assert!(session.review_next());
        assert!(!session.review_next());
        assert_eq!(session.current_review_item().unwrap().question.id, 3);

        assert!(session.close_review());
        assert_eq!(session.phase(), QuizPhase::Results);
    }

    #[test]
    fn reopening_after_reset_starts_fresh() {
        let mut session = in_progress(three_questions());
        session.select_answer("Paris");
        session.next();

        assert!(session.reset());
        assert_eq!(session.phase(), QuizPhase::Browsing);
        assert!(session.answers().is_empty());

        assert!(session.open(1));
        session.finish_loading(Ok(three_questions())).unwrap();
        assert_eq!(session.current_index(), 0);
        assert!(session.answers().is_empty());
        assert_eq!(session.current_answer(), None);
    }

    #[test]
    fn reset_is_available_from_results() {
        let mut session = in_progress(vec![question(1, &["A"], "A")]);
        session.begin_submit();
        session.finish_submit();

        assert!(session.reset());
        assert_eq!(session.phase(), QuizPhase::Browsing);
        assert!(session.score().is_none());
    }

    #[test]
    fn delete_only_from_browsing_and_blocks_opening() {
        let mut session = in_progress(three_questions());
        assert!(!session.request_delete(1));
        session.reset();

        assert!(session.request_delete(2));
        assert!(!session.open(1));
        assert!(!session.open(2));

        assert!(session.cancel_delete());
        assert!(session.open(1));
    }

    #[test]
    fn in_flight_delete_cannot_be_cancelled_or_confirmed_twice() {
        let mut session = QuizSession::new();
        session.set_quizzes(vec![quiz(1), quiz(2)]);
        session.request_delete(2);

        assert_eq!(session.confirm_delete(), Some(2));
        assert_eq!(session.confirm_delete(), None);
        assert!(!session.cancel_delete());
        assert!(!session.open(1));

        session.finish_delete(Ok(())).unwrap();
        assert_eq!(session.quizzes().len(), 1);
        assert_eq!(session.quizzes()[0].id, 1);
        assert!(session.pending_delete().is_none());
    }

    #[test]
    fn failed_delete_keeps_quiz_listed() {
        let mut session = QuizSession::new();
        session.set_quizzes(vec![quiz(1)]);
        session.request_delete(1);
        session.confirm_delete();

        let result = session.finish_delete(Err(AppError::Persistence("locked".into())));

        assert!(result.is_err());
        assert_eq!(session.quizzes().len(), 1);
        assert!(session.pending_delete().is_none());
    }

    #[test]
    fn deleting_last_quiz_clamps_selection() {
        let mut session = QuizSession::new();
        session.set_quizzes(vec![quiz(1), quiz(2)]);
        session.select_next_quiz();
        assert_eq!(session.selected_index(), 1);

        session.request_delete(2);
        session.confirm_delete();
        session.finish_delete(Ok(())).unwrap();

        assert_eq!(session.selected_index(), 0);
        assert_eq!(session.selected_quiz().map(|q| q.id), Some(1));
    }
}
