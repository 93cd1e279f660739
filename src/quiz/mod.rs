mod flow;
mod session;

pub use flow::{apply_event, delete_quiz, load_quizzes, open_quiz, submit_quiz, QuizEvent, QuizUpdate};
pub use session::{PendingDelete, QuizPhase, QuizSession};
