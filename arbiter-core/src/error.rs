use thiserror::Error;

pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("connection table truncated: expected {expected} rows, buffer holds {available}")]
    TableTruncated { expected: usize, available: usize },

    #[error("connection table buffer too small: need {needed} bytes, have {have}")]
    InsufficientBuffer { needed: usize, have: usize },

    #[error("image encode error: {0}")]
    Encode(String),

    #[error("realtime channel error: {0}")]
    Realtime(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}
