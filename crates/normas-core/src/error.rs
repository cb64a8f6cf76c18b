use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Failed to load {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Invalid query: {0}")]
    Validation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Problems with the persisted vector index.
///
/// Everything except `DimensionMismatch` is raised while opening an existing
/// index and is recovered by rebuilding it.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Vector store failure: {0}")]
    Storage(String),

    #[error("Persisted index is incompatible: {0}")]
    Incompatible(String),

    #[error("Persisted index is corrupt: {0}")]
    Corrupt(String),

    #[error("Vector has dimension {actual}, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Failures talking to the embedding or chat service.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("No API key found; set OPENAI_API_KEY")]
    MissingApiKey,

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Embedding has dimension {actual}, model is configured for {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl ClientError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transport(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
