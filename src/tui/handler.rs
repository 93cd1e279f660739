use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::quiz::QuizPhase;

/// Which keymap applies, derived from the app state on every key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Help,
    /// A delete confirmation dialog is open.
    Confirm,
    /// Typing into the generate form.
    TextEntry,
    Quiz(QuizPhase),
    /// Browsing the notes list.
    Normal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    Quit,
    ShowHelp,
    HideHelp,
    ShowGenerate,
    ShowNotes,
    ShowQuizzes,
    MoveUp,
    MoveDown,
    // Generate form
    InputChar(char),
    InputNewline,
    InputBackspace,
    NextField,
    SubmitGeneration,
    // Quiz list
    OpenQuiz,
    ReloadQuizzes,
    // Quiz session
    NextQuestion,
    PreviousQuestion,
    SelectOption(usize),
    SubmitQuiz,
    ReviewAnswers,
    CloseReview,
    ExitQuiz,
    // Deletion
    RequestDelete,
    ConfirmDelete,
    CancelDelete,
}

pub fn handle_key_event(key: KeyEvent, mode: InputMode) -> Option<AppAction> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(AppAction::Quit);
    }

    match mode {
        InputMode::Help => Some(AppAction::HideHelp),

        InputMode::Confirm => match key.code {
            KeyCode::Char('y') | KeyCode::Enter => Some(AppAction::ConfirmDelete),
            KeyCode::Char('n') | KeyCode::Esc => Some(AppAction::CancelDelete),
            _ => None,
        },

        InputMode::TextEntry => match (key.code, key.modifiers) {
            (KeyCode::Enter, m) if m.contains(KeyModifiers::ALT) => Some(AppAction::InputNewline),
            (KeyCode::Enter, _) => Some(AppAction::SubmitGeneration),
            (KeyCode::Tab, _) => Some(AppAction::NextField),
            (KeyCode::Backspace, _) => Some(AppAction::InputBackspace),
            (KeyCode::Esc, _) => Some(AppAction::ShowNotes),
            (KeyCode::Char(c), _) => Some(AppAction::InputChar(c)),
            _ => None,
        },

        InputMode::Quiz(phase) => handle_quiz_key(key, phase),

        InputMode::Normal => match key.code {
            KeyCode::Char('q') => Some(AppAction::Quit),
            KeyCode::Char('?') => Some(AppAction::ShowHelp),
            KeyCode::Char('1') => Some(AppAction::ShowGenerate),
            KeyCode::Char('2') => Some(AppAction::ShowNotes),
            KeyCode::Char('3') => Some(AppAction::ShowQuizzes),
            KeyCode::Char('j') | KeyCode::Down => Some(AppAction::MoveDown),
            KeyCode::Char('k') | KeyCode::Up => Some(AppAction::MoveUp),
            KeyCode::Char('d') => Some(AppAction::RequestDelete),
            _ => None,
        },
    }
}

fn handle_quiz_key(key: KeyEvent, phase: QuizPhase) -> Option<AppAction> {
    match phase {
        QuizPhase::Browsing => match key.code {
            KeyCode::Char('q') => Some(AppAction::Quit),
            KeyCode::Char('?') => Some(AppAction::ShowHelp),
            KeyCode::Char('1') => Some(AppAction::ShowGenerate),
            KeyCode::Char('2') => Some(AppAction::ShowNotes),
            KeyCode::Char('3') | KeyCode::Char('r') => Some(AppAction::ReloadQuizzes),
            KeyCode::Char('j') | KeyCode::Down => Some(AppAction::MoveDown),
            KeyCode::Char('k') | KeyCode::Up => Some(AppAction::MoveUp),
            KeyCode::Enter => Some(AppAction::OpenQuiz),
            KeyCode::Char('d') => Some(AppAction::RequestDelete),
            _ => None,
        },

        QuizPhase::InProgress => match key.code {
            KeyCode::Char('l') | KeyCode::Right => Some(AppAction::NextQuestion),
            KeyCode::Char('h') | KeyCode::Left => Some(AppAction::PreviousQuestion),
            KeyCode::Char(c @ '1'..='9') => Some(AppAction::SelectOption(c as usize - '1' as usize)),
            KeyCode::Enter => Some(AppAction::SubmitQuiz),
            KeyCode::Esc => Some(AppAction::ExitQuiz),
            _ => None,
        },

        QuizPhase::Results => match key.code {
            KeyCode::Char('r') => Some(AppAction::ReviewAnswers),
            KeyCode::Esc | KeyCode::Enter => Some(AppAction::ExitQuiz),
            _ => None,
        },

        QuizPhase::Reviewing => match key.code {
            KeyCode::Char('l') | KeyCode::Right => Some(AppAction::NextQuestion),
            KeyCode::Char('h') | KeyCode::Left => Some(AppAction::PreviousQuestion),
            KeyCode::Esc => Some(AppAction::CloseReview),
            KeyCode::Char('x') => Some(AppAction::ExitQuiz),
            _ => None,
        },

        // Waiting on storage; only Ctrl+C gets through.
        QuizPhase::Loading | QuizPhase::Submitting => None,
    }
}
