use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// The pipeline ended in an error event; holds the message shown to
    /// the user.
    #[error("Answer failed: {0}")]
    AnswerFailed(String),

    #[error("Embedding model mismatch: index was built with `{index}`, query encoder is `{encoder}`")]
    EmbeddingModelMismatch { index: String, encoder: String },

    #[error("Embedding dimension mismatch: index stores {index}-d vectors, query encoder produces {encoder}-d")]
    EmbeddingDimensionMismatch { index: usize, encoder: usize },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn external(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }

    pub fn retrieval(msg: impl Into<String>) -> Self {
        Self::Retrieval(msg.into())
    }

    /// Text safe to show to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::AnswerFailed(msg) => msg.clone(),
            Self::Generation(e) => e.user_message().to_string(),
            Self::Retrieval(_) | Self::ExternalService(_) => {
                "Search is temporarily unavailable. Please try again shortly.".to_string()
            }
            _ => "An unexpected error occurred.".to_string(),
        }
    }
}

/// Failures of the upstream language model. These are terminal for a
/// streaming call and are shown to the user only through `user_message`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generation timed out")]
    Timeout,

    #[error("language model unavailable: {0}")]
    Unavailable(String),

    #[error("language model rate limited: {0}")]
    RateLimited(String),

    #[error("language model error: {0}")]
    Upstream(String),
}

impl GenerationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Timeout => {
                "The response is taking longer than expected. Please try your question again."
            }
            Self::Unavailable(_) => {
                "The answer service is temporarily unavailable. Please try again shortly."
            }
            Self::RateLimited(_) => {
                "The answer service is busy right now. Please wait a moment and try again."
            }
            Self::Upstream(_) => {
                "I was unable to complete a response to this question. Please try again."
            }
        }
    }

    /// Maps a provider error description onto the taxonomy.
    pub fn classify(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let lower = detail.to_lowercase();
        if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests") {
            Self::RateLimited(detail)
        } else if lower.contains("timed out") || lower.contains("timeout") {
            Self::Timeout
        } else if lower.contains("503")
            || lower.contains("502")
            || lower.contains("connection")
            || lower.contains("unavailable")
        {
            Self::Unavailable(detail)
        } else {
            Self::Upstream(detail)
        }
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
