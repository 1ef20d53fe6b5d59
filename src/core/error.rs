use thiserror::Error;

#[derive(Error, Debug)]
pub enum NashError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Context store lock poisoned")]
    LockPoisoned,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

impl NashError {
    pub fn config(message: impl Into<String>) -> Self {
        NashError::Config(config::ConfigError::Message(message.into()))
    }
}

pub type Result<T, E = NashError> = std::result::Result<T, E>;
