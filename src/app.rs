use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::ai::{ContentGenerator, GenerationClient, GenerationInput};
use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{Flashcard, Note, SourceKind};
use crate::quiz::{self, PendingDelete, QuizEvent, QuizPhase, QuizSession, QuizUpdate};
use crate::services::{generate_material, FanoutReport};
use crate::tui::{AppAction, InputMode, Theme};

const NOTIFICATION_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Generate,
    Notes,
    Quizzes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateField {
    Topic,
    Title,
    Content,
}

impl GenerateField {
    fn next(self) -> Self {
        match self {
            GenerateField::Topic => GenerateField::Title,
            GenerateField::Title => GenerateField::Content,
            GenerateField::Content => GenerateField::Topic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

/// Outcome of a note delete running in the background.
struct NoteDeleteResult {
    note_id: i64,
    result: Result<()>,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    shown_at: Instant,
}

pub struct App {
    pub view: View,
    pub theme: Theme,
    pub show_help: bool,
    pub notification: Option<Notification>,

    // Generate form
    pub generate_field: GenerateField,
    pub topic_input: String,
    pub title_input: String,
    pub content_input: String,
    pub is_generating: bool,
    generation_rx: mpsc::Receiver<Result<FanoutReport>>,
    generation_tx: mpsc::Sender<Result<FanoutReport>>,

    // Notes
    pub notes: Vec<Note>,
    pub selected_note: usize,
    pub note_delete: Option<PendingDelete>,
    pub material_count: usize,
    note_delete_rx: mpsc::Receiver<NoteDeleteResult>,
    note_delete_tx: mpsc::Sender<NoteDeleteResult>,

    // Quizzes
    pub quiz: QuizSession,
    pub attempt_count: usize,
    quiz_rx: mpsc::Receiver<QuizEvent>,
    quiz_tx: mpsc::Sender<QuizEvent>,

    // Services
    repository: Repository,
    generator: Option<Arc<dyn ContentGenerator>>,
    owner: String,
}

impl App {
    pub async fn new(config: &Config) -> Result<Self> {
        let repository = Repository::new(&config.db_path).await?;

        let generator = match &config.api_key {
            Some(key) => {
                let client =
                    GenerationClient::new(config.api_url.clone(), key.clone(), config.model.clone())?;
                Some(Arc::new(client) as Arc<dyn ContentGenerator>)
            }
            None => {
                tracing::warn!("No api_key configured; generation is disabled");
                None
            }
        };

        let mut app = Self::with_services(
            repository,
            generator,
            config.user_id.clone(),
            Theme::resolve(config.theme),
        );
        app.reload_notes().await?;
        Ok(app)
    }

    pub fn with_services(
        repository: Repository,
        generator: Option<Arc<dyn ContentGenerator>>,
        owner: String,
        theme: Theme,
    ) -> Self {
        let (generation_tx, generation_rx) = mpsc::channel(1);
        let (note_delete_tx, note_delete_rx) = mpsc::channel(1);
        let (quiz_tx, quiz_rx) = mpsc::channel(4);

        Self {
            view: View::Generate,
            theme,
            show_help: false,
            notification: None,
            generate_field: GenerateField::Topic,
            topic_input: String::new(),
            title_input: String::new(),
            content_input: String::new(),
            is_generating: false,
            generation_rx,
            generation_tx,
            notes: Vec::new(),
            selected_note: 0,
            note_delete: None,
            material_count: 0,
            note_delete_rx,
            note_delete_tx,
            quiz: QuizSession::new(),
            attempt_count: 0,
            quiz_rx,
            quiz_tx,
            repository,
            generator,
            owner,
        }
    }

    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    pub fn input_mode(&self) -> InputMode {
        if self.show_help {
            return InputMode::Help;
        }
        match self.view {
            View::Generate => InputMode::TextEntry,
            View::Notes if self.note_delete.is_some() => InputMode::Confirm,
            View::Notes => InputMode::Normal,
            View::Quizzes if self.quiz.pending_delete().is_some() => InputMode::Confirm,
            View::Quizzes => InputMode::Quiz(self.quiz.phase()),
        }
    }

    pub fn selected_note(&self) -> Option<&Note> {
        self.notes.get(self.selected_note)
    }

    fn notify(&mut self, kind: NotificationKind, message: impl Into<String>) {
        let message = message.into();
        match kind {
            NotificationKind::Success => tracing::info!("{}", message),
            NotificationKind::Error => tracing::warn!("{}", message),
        }
        self.notification = Some(Notification {
            kind,
            message,
            shown_at: Instant::now(),
        });
    }

    fn notify_error(&mut self, error: &AppError) {
        self.notify(NotificationKind::Error, error.user_message());
    }

    /// Expires old notifications.
    pub fn tick(&mut self) {
        if self
            .notification
            .as_ref()
            .is_some_and(|n| n.shown_at.elapsed() >= NOTIFICATION_TTL)
        {
            self.notification = None;
        }
    }

    pub async fn handle_action(&mut self, action: AppAction) -> Result<bool> {
        match action {
            AppAction::Quit => return Ok(true),
            AppAction::ShowHelp => self.show_help = true,
            AppAction::HideHelp => self.show_help = false,

            AppAction::ShowGenerate => self.view = View::Generate,
            AppAction::ShowNotes => self.enter_notes().await,
            AppAction::ShowQuizzes | AppAction::ReloadQuizzes => self.enter_quizzes().await,

            AppAction::MoveUp => match self.view {
                View::Notes => self.selected_note = self.selected_note.saturating_sub(1),
                View::Quizzes => self.quiz.select_previous_quiz(),
                View::Generate => {}
            },
            AppAction::MoveDown => match self.view {
                View::Notes => {
                    if self.selected_note + 1 < self.notes.len() {
                        self.selected_note += 1;
                    }
                }
                View::Quizzes => self.quiz.select_next_quiz(),
                View::Generate => {}
            },

            AppAction::InputChar(c) => self.active_input().push(c),
            AppAction::InputNewline => {
                if self.generate_field == GenerateField::Content {
                    self.content_input.push('\n');
                }
            }
            AppAction::InputBackspace => {
                self.active_input().pop();
            }
            AppAction::NextField => self.generate_field = self.generate_field.next(),
            AppAction::SubmitGeneration => self.start_generation(),

            AppAction::OpenQuiz => self.open_selected_quiz(),
            AppAction::NextQuestion => {
                if self.quiz.phase() == QuizPhase::Reviewing {
                    self.quiz.review_next();
                } else {
                    self.quiz.next();
                }
            }
            AppAction::PreviousQuestion => {
                if self.quiz.phase() == QuizPhase::Reviewing {
                    self.quiz.review_previous();
                } else {
                    self.quiz.previous();
                }
            }
            AppAction::SelectOption(index) => {
                self.quiz.select_option(index);
            }
            AppAction::SubmitQuiz => {
                quiz::submit_quiz(&mut self.quiz, &self.repository, &self.owner, &self.quiz_tx);
            }
            AppAction::ReviewAnswers => {
                self.quiz.review();
            }
            AppAction::CloseReview => {
                self.quiz.close_review();
            }
            AppAction::ExitQuiz => {
                self.quiz.reset();
            }

            AppAction::RequestDelete => self.request_delete(),
            AppAction::ConfirmDelete => self.confirm_delete(),
            AppAction::CancelDelete => match self.view {
                View::Notes => {
                    if self.note_delete.is_some_and(|p| !p.in_flight) {
                        self.note_delete = None;
                    }
                }
                View::Quizzes => {
                    self.quiz.cancel_delete();
                }
                View::Generate => {}
            },
        }

        Ok(false)
    }

    fn active_input(&mut self) -> &mut String {
        match self.generate_field {
            GenerateField::Topic => &mut self.topic_input,
            GenerateField::Title => &mut self.title_input,
            GenerateField::Content => &mut self.content_input,
        }
    }

    // Generation

    fn generation_input(&self) -> GenerationInput {
        match self.generate_field {
            GenerateField::Topic => GenerationInput::Topic {
                topic: self.topic_input.clone(),
            },
            GenerateField::Title | GenerateField::Content => GenerationInput::Paste {
                title: self.title_input.clone(),
                content: self.content_input.clone(),
                source: SourceKind::Pasted,
            },
        }
    }

    pub fn start_generation(&mut self) {
        if self.is_generating {
            return;
        }
        let Some(generator) = self.generator.clone() else {
            self.notify(
                NotificationKind::Error,
                "Generation is unavailable: add api_key to the config file.",
            );
            return;
        };

        let input = self.generation_input();
        if let Err(e) = input.validate() {
            self.notify_error(&e);
            return;
        }

        self.is_generating = true;

        let repo = self.repository.clone();
        let owner = self.owner.clone();
        let tx = self.generation_tx.clone();

        tokio::spawn(async move {
            let result = generate_material(generator.as_ref(), &repo, &owner, input).await;
            let _ = tx.send(result).await;
        });
    }

    /// Poll for a finished generation (non-blocking).
    pub async fn poll_generation_result(&mut self) -> Result<()> {
        if let Ok(result) = self.generation_rx.try_recv() {
            self.is_generating = false;
            match result {
                Ok(report) => {
                    self.topic_input.clear();
                    self.title_input.clear();
                    self.content_input.clear();
                    self.notify(
                        NotificationKind::Success,
                        format!(
                            "Study materials for '{}' generated: {} flashcards, {} quiz questions.",
                            report.title, report.flashcard_count, report.question_count
                        ),
                    );
                    self.enter_notes().await;
                }
                Err(e) => {
                    tracing::error!("Generation failed: {}", e);
                    self.notify_error(&e);
                }
            }
        }
        Ok(())
    }

    /// Runs one generation to completion without the TUI.
    pub async fn generate_headless(&self, input: GenerationInput) -> Result<FanoutReport> {
        let generator = self.generator.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "api_key is not configured; add it to {}",
                Config::config_path().display()
            )
        })?;
        generate_material(generator.as_ref(), &self.repository, &self.owner, input).await
    }

    pub async fn flashcards_for(&self, material_id: i64) -> Result<Vec<Flashcard>> {
        self.repository
            .get_flashcards_for_material(&self.owner, material_id)
            .await
    }

    // Notes

    async fn enter_notes(&mut self) {
        self.view = View::Notes;
        if let Err(e) = self.reload_notes().await {
            self.notify_error(&e.into_persistence());
        }
    }

    async fn reload_notes(&mut self) -> Result<()> {
        self.notes = self.repository.get_all_notes(&self.owner).await?;
        self.material_count = self.repository.get_all_materials(&self.owner).await?.len();
        if self.selected_note >= self.notes.len() {
            self.selected_note = self.notes.len().saturating_sub(1);
        }
        Ok(())
    }

    // Quizzes

    async fn enter_quizzes(&mut self) {
        self.view = View::Quizzes;
        if let Err(e) = quiz::load_quizzes(&mut self.quiz, &self.repository, &self.owner).await {
            self.notify_error(&e);
        }
    }

    fn open_selected_quiz(&mut self) {
        let Some(quiz_id) = self.quiz.selected_quiz().map(|q| q.id) else {
            return;
        };
        quiz::open_quiz(&mut self.quiz, &self.repository, &self.owner, quiz_id, &self.quiz_tx);
    }

    /// Poll for finished quiz loads, submissions and deletes (non-blocking).
    pub async fn poll_quiz_result(&mut self) -> Result<()> {
        let Ok(event) = self.quiz_rx.try_recv() else {
            return Ok(());
        };

        match quiz::apply_event(&mut self.quiz, event) {
            Ok(QuizUpdate::Submitted(outcome)) => {
                match outcome.log_error {
                    Some(e) => self.notify_error(&e),
                    None => self.notify(
                        NotificationKind::Success,
                        format!(
                            "You scored {}/{} ({}%)",
                            outcome.score.correct,
                            outcome.score.total,
                            outcome.score.display_percentage()
                        ),
                    ),
                }
                self.attempt_count = match self
                    .repository
                    .get_quiz_attempts(&self.owner, outcome.quiz_id)
                    .await
                {
                    Ok(attempts) => attempts.len(),
                    Err(e) => {
                        tracing::warn!("Failed to count attempts: {}", e);
                        0
                    }
                };
            }
            Ok(QuizUpdate::Deleted { .. }) => self.notify(NotificationKind::Success, "Quiz deleted."),
            Ok(QuizUpdate::Opened { .. } | QuizUpdate::Stale) => {}
            Err(e) => self.notify_error(&e),
        }
        Ok(())
    }

    // Deletion

    fn request_delete(&mut self) {
        match self.view {
            View::Notes => {
                if self.note_delete.is_none() {
                    if let Some(note) = self.selected_note() {
                        self.note_delete = Some(PendingDelete {
                            id: note.id,
                            in_flight: false,
                        });
                    }
                }
            }
            View::Quizzes => {
                if let Some(quiz_id) = self.quiz.selected_quiz().map(|q| q.id) {
                    self.quiz.request_delete(quiz_id);
                }
            }
            View::Generate => {}
        }
    }

    fn confirm_delete(&mut self) {
        match self.view {
            View::Notes => self.delete_selected_note(),
            View::Quizzes => {
                quiz::delete_quiz(&mut self.quiz, &self.repository, &self.owner, &self.quiz_tx);
            }
            View::Generate => {}
        }
    }

    fn delete_selected_note(&mut self) {
        let Some(pending) = self.note_delete.as_mut() else {
            return;
        };
        if pending.in_flight {
            return;
        }
        pending.in_flight = true;
        let note_id = pending.id;

        let repo = self.repository.clone();
        let owner = self.owner.clone();
        let tx = self.note_delete_tx.clone();

        tokio::spawn(async move {
            let result = match repo.delete_note(&owner, note_id).await {
                Ok(0) => Err(AppError::DeleteFailed("note not found".to_string())),
                Ok(_) => Ok(()),
                Err(e) => Err(e.into_delete_failure()),
            };
            let _ = tx.send(NoteDeleteResult { note_id, result }).await;
        });
    }

    /// Poll for a finished note delete (non-blocking).
    pub fn poll_note_delete_result(&mut self) {
        let Ok(done) = self.note_delete_rx.try_recv() else {
            return;
        };
        // Only the delete the dialog is waiting on
        if self.note_delete.map(|p| p.id) != Some(done.note_id) {
            return;
        }
        self.note_delete = None;

        match done.result {
            Ok(()) => {
                self.notes.retain(|n| n.id != done.note_id);
                if self.selected_note >= self.notes.len() {
                    self.selected_note = self.notes.len().saturating_sub(1);
                }
                self.notify(NotificationKind::Success, "Note deleted.");
            }
            Err(e) => self.notify_error(&e),
        }
    }
}
