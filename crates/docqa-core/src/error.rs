use thiserror::Error;

/// Every failure the indexing and retrieval pipeline can surface.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Embedding failed: {0}")]
    EmbeddingFailure(String),

    #[error("Generation failed: {0}")]
    GenerationFailure(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short stable label for log records.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidConfig(_) => "invalid_config",
            Error::EmbeddingFailure(_) => "embedding_failure",
            Error::GenerationFailure(_) => "generation_failure",
            Error::Timeout(_) => "timeout",
            Error::DimensionMismatch { .. } => "dimension_mismatch",
            Error::Persistence(_) => "persistence_error",
            Error::CorruptIndex(_) => "corrupt_index",
            Error::Io(_) => "io",
        }
    }

    /// Collaborator failures are network-shaped and may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::EmbeddingFailure(_) | Error::GenerationFailure(_) | Error::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
