mod flashcard;
mod material;
mod note;
mod quiz;

pub use flashcard::{Difficulty, Flashcard, NewFlashcard};
pub use material::{Material, NewMaterial, SourceKind};
pub use note::{NewNote, Note};
pub use quiz::{options_from_value, NewQuestion, NewQuiz, Question, QuestionType, Quiz, QuizAttempt};
