use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("generation service is rate limiting requests")]
    RateLimited,

    #[error("AI usage quota exhausted")]
    QuotaExhausted,

    #[error("generation service error: {0}")]
    Upstream(String),

    #[error("generated content could not be parsed: {0}")]
    GenerationFormat(String),

    #[error("failed to save: {0}")]
    Persistence(String),

    #[error("failed to delete: {0}")]
    DeleteFailed(String),

    #[error("quiz has no playable questions")]
    NotFoundOrEmpty,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Text shown in the notification line when an operation fails.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::RateLimited => {
                "Rate limit exceeded. Please try again in a moment.".to_string()
            }
            AppError::QuotaExhausted => {
                "AI credits exhausted. Please add credits to continue.".to_string()
            }
            AppError::Upstream(_) | AppError::Http(_) => {
                "Failed to generate study materials. Please try again.".to_string()
            }
            AppError::GenerationFormat(_) => {
                "The AI returned content in an unexpected format. Please try again.".to_string()
            }
            AppError::Persistence(msg) => format!("Failed to save: {msg}"),
            AppError::Database(e) => format!("Failed to save: {e}"),
            AppError::Sqlite(e) => format!("Failed to save: {e}"),
            AppError::DeleteFailed(msg) => format!("Failed to delete: {msg}"),
            AppError::NotFoundOrEmpty => {
                "This quiz has no questions available.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Collapses storage-layer failures into `Persistence` so callers see one kind.
    pub fn into_persistence(self) -> Self {
        match self {
            AppError::Database(e) => AppError::Persistence(e.to_string()),
            AppError::Sqlite(e) => AppError::Persistence(e.to_string()),
            other => other,
        }
    }

    /// Like `into_persistence`, but for a failed delete.
    pub fn into_delete_failure(self) -> Self {
        match self.into_persistence() {
            AppError::Persistence(msg) => AppError::DeleteFailed(msg),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
