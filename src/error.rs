use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    /// Business-logic storage errors (missing table, bad row shape, etc.)
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Raw database errors from rusqlite
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Date parse errors from chrono
    #[error("Date parse error: {0}")]
    DateParse(#[from] chrono::ParseError),
}

pub type FeedResult<T> = Result<T, FeedError>;
