use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{
    options_from_value, Difficulty, Flashcard, Material, NewFlashcard, NewMaterial, NewNote,
    NewQuestion, NewQuiz, Note, Question, QuestionType, Quiz, QuizAttempt, SourceKind,
};

use super::schema::SCHEMA;

/// Owner-scoped access to the study database. Every query filters on the
/// owner column; questions are reached through their quiz's owner.
#[derive(Clone)]
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    #[cfg(test)]
    pub async fn execute_raw(&self, sql: &'static str) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute_batch(sql)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Material operations

    pub async fn insert_material(&self, owner: &str, material: NewMaterial) -> Result<i64> {
        let owner = owner.to_string();
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO materials (owner, title, content, source_kind, summary) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        owner,
                        material.title,
                        material.content,
                        material.source.as_str(),
                        material.summary,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn get_all_materials(&self, owner: &str) -> Result<Vec<Material>> {
        let owner = owner.to_string();
        let materials = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, owner, title, content, source_kind, summary, created_at FROM materials WHERE owner = ?1 ORDER BY created_at DESC, id DESC",
                )?;
                let materials = stmt
                    .query_map(params![owner], material_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(materials)
            })
            .await?;
        Ok(materials)
    }

    // Note operations

    pub async fn insert_note(&self, owner: &str, note: NewNote) -> Result<i64> {
        let owner = owner.to_string();
        let key_points = serde_json::to_string(&note.key_points)?;
        let examples = serde_json::to_string(&note.examples)?;
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO notes (owner, material_id, title, content, key_points, examples) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![owner, note.material_id, note.title, note.content, key_points, examples],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn get_all_notes(&self, owner: &str) -> Result<Vec<Note>> {
        let owner = owner.to_string();
        let notes = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, owner, material_id, title, content, key_points, examples, created_at FROM notes WHERE owner = ?1 ORDER BY created_at DESC, id DESC",
                )?;
                let notes = stmt
                    .query_map(params![owner], note_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(notes)
            })
            .await?;
        Ok(notes)
    }

    /// Returns the number of rows removed (0 when the note is missing or not owned).
    pub async fn delete_note(&self, owner: &str, id: i64) -> Result<usize> {
        let owner = owner.to_string();
        let removed = self
            .conn
            .call(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM notes WHERE id = ?1 AND owner = ?2",
                    params![id, owner],
                )?;
                Ok(removed)
            })
            .await?;
        Ok(removed)
    }

    // Flashcard operations

    /// Inserts all cards in one transaction: either every row lands or none does.
    pub async fn insert_flashcards(&self, owner: &str, cards: Vec<NewFlashcard>) -> Result<usize> {
        let owner = owner.to_string();
        let count = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO flashcards (owner, material_id, question, answer, difficulty) VALUES (?1, ?2, ?3, ?4, ?5)",
                    )?;
                    for card in &cards {
                        stmt.execute(params![
                            owner,
                            card.material_id,
                            card.question,
                            card.answer,
                            card.difficulty.as_str(),
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(cards.len())
            })
            .await?;
        Ok(count)
    }

    pub async fn get_flashcards_for_material(
        &self,
        owner: &str,
        material_id: i64,
    ) -> Result<Vec<Flashcard>> {
        let owner = owner.to_string();
        let cards = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, owner, material_id, question, answer, difficulty, is_starred, created_at FROM flashcards WHERE owner = ?1 AND material_id = ?2 ORDER BY id",
                )?;
                let cards = stmt
                    .query_map(params![owner, material_id], flashcard_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(cards)
            })
            .await?;
        Ok(cards)
    }

    // Quiz operations

    pub async fn insert_quiz(&self, owner: &str, quiz: NewQuiz) -> Result<i64> {
        let owner = owner.to_string();
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO quizzes (owner, material_id, title) VALUES (?1, ?2, ?3)",
                    params![owner, quiz.material_id, quiz.title],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn get_all_quizzes(&self, owner: &str) -> Result<Vec<Quiz>> {
        let owner = owner.to_string();
        let quizzes = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, owner, material_id, title, created_at FROM quizzes WHERE owner = ?1 ORDER BY created_at DESC, id DESC",
                )?;
                let quizzes = stmt
                    .query_map(params![owner], quiz_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(quizzes)
            })
            .await?;
        Ok(quizzes)
    }

    /// Inserts all questions for a quiz in one transaction. Fails if the quiz
    /// does not belong to `owner`.
    pub async fn insert_questions(
        &self,
        owner: &str,
        quiz_id: i64,
        questions: Vec<NewQuestion>,
    ) -> Result<usize> {
        let owner = owner.to_string();
        let mut rows = Vec::with_capacity(questions.len());
        for q in questions {
            let options = serde_json::to_string(&q.options)?;
            rows.push((q, options));
        }
        let count = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.query_row(
                    "SELECT id FROM quizzes WHERE id = ?1 AND owner = ?2",
                    params![quiz_id, owner],
                    |row| row.get::<_, i64>(0),
                )?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO questions (quiz_id, question, question_type, options, correct_answer, explanation) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    )?;
                    for (q, options) in &rows {
                        stmt.execute(params![
                            quiz_id,
                            q.question,
                            q.question_type.as_str(),
                            options,
                            q.correct_answer,
                            q.explanation,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await?;
        Ok(count)
    }

    pub async fn get_questions(&self, owner: &str, quiz_id: i64) -> Result<Vec<Question>> {
        let owner = owner.to_string();
        let questions = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT q.id, q.quiz_id, q.question, q.question_type, q.options,
                              q.correct_answer, q.explanation
                       FROM questions q
                       JOIN quizzes z ON q.quiz_id = z.id
                       WHERE q.quiz_id = ?1 AND z.owner = ?2
                       ORDER BY q.id"#,
                )?;
                let questions = stmt
                    .query_map(params![quiz_id, owner], question_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(questions)
            })
            .await?;
        Ok(questions)
    }

    /// Deletes the quiz's questions first, then the quiz itself. Returns the
    /// number of quiz rows removed (0 when missing or not owned).
    pub async fn delete_quiz(&self, owner: &str, quiz_id: i64) -> Result<usize> {
        let owner = owner.to_string();
        let removed = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM questions WHERE quiz_id IN (SELECT id FROM quizzes WHERE id = ?1 AND owner = ?2)",
                    params![quiz_id, owner],
                )?;
                let removed = tx.execute(
                    "DELETE FROM quizzes WHERE id = ?1 AND owner = ?2",
                    params![quiz_id, owner],
                )?;
                tx.commit()?;
                Ok(removed)
            })
            .await?;
        Ok(removed)
    }

    // Attempt log

    pub async fn insert_quiz_attempt(
        &self,
        owner: &str,
        quiz_id: i64,
        score: f64,
        total_questions: u32,
    ) -> Result<i64> {
        let owner = owner.to_string();
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO quiz_attempts (owner, quiz_id, score, total_questions) VALUES (?1, ?2, ?3, ?4)",
                    params![owner, quiz_id, score, total_questions],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn get_quiz_attempts(&self, owner: &str, quiz_id: i64) -> Result<Vec<QuizAttempt>> {
        let owner = owner.to_string();
        let attempts = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, owner, quiz_id, score, total_questions, completed_at FROM quiz_attempts WHERE owner = ?1 AND quiz_id = ?2 ORDER BY id",
                )?;
                let attempts = stmt
                    .query_map(params![owner, quiz_id], attempt_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(attempts)
            })
            .await?;
        Ok(attempts)
    }

    #[cfg(test)]
    pub async fn count_questions(&self, quiz_id: i64) -> Result<i64> {
        let count = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM questions WHERE quiz_id = ?1",
                    params![quiz_id],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') format, e.g. "2026-01-11 12:34:56"
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn timestamp(row: &Row, idx: usize) -> DateTime<Utc> {
    row.get::<_, String>(idx)
        .ok()
        .and_then(|s| parse_datetime(&s))
        .unwrap_or_else(Utc::now)
}

fn string_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn material_from_row(row: &Row) -> rusqlite::Result<Material> {
    let source: String = row.get(4)?;
    Ok(Material {
        id: row.get(0)?,
        owner: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        source: SourceKind::parse(&source).unwrap_or(SourceKind::Pasted),
        summary: row.get(5)?,
        created_at: timestamp(row, 6),
    })
}

fn note_from_row(row: &Row) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        owner: row.get(1)?,
        material_id: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        key_points: string_list(&row.get::<_, String>(5)?),
        examples: string_list(&row.get::<_, String>(6)?),
        created_at: timestamp(row, 7),
    })
}

fn flashcard_from_row(row: &Row) -> rusqlite::Result<Flashcard> {
    Ok(Flashcard {
        id: row.get(0)?,
        owner: row.get(1)?,
        material_id: row.get(2)?,
        question: row.get(3)?,
        answer: row.get(4)?,
        difficulty: Difficulty::parse_lenient(&row.get::<_, String>(5)?),
        is_starred: row.get::<_, i64>(6)? != 0,
        created_at: timestamp(row, 7),
    })
}

fn quiz_from_row(row: &Row) -> rusqlite::Result<Quiz> {
    Ok(Quiz {
        id: row.get(0)?,
        owner: row.get(1)?,
        material_id: row.get(2)?,
        title: row.get(3)?,
        created_at: timestamp(row, 4),
    })
}

fn question_from_row(row: &Row) -> rusqlite::Result<Question> {
    let options = row
        .get::<_, Option<String>>(4)?
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
        .map(|value| options_from_value(&value))
        .unwrap_or_default();
    Ok(Question {
        id: row.get(0)?,
        quiz_id: row.get(1)?,
        question: row.get(2)?,
        question_type: QuestionType::parse_lenient(&row.get::<_, String>(3)?),
        options,
        correct_answer: row.get(5)?,
        explanation: row.get(6)?,
    })
}

fn attempt_from_row(row: &Row) -> rusqlite::Result<QuizAttempt> {
    Ok(QuizAttempt {
        id: row.get(0)?,
        owner: row.get(1)?,
        quiz_id: row.get(2)?,
        score: row.get(3)?,
        total_questions: row.get(4)?,
        completed_at: timestamp(row, 5),
    })
}
