use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Chat with id {0} not found")]
    ChatNotFound(String),

    #[error("Summary for chat with id {0} not found")]
    SummaryNotFound(String),

    #[error("Chat path for chat with id {0} not found")]
    PathNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PersistError>;
