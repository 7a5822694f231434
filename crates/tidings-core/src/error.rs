use thiserror::Error;

/// Application-wide error types for Tidings.
///
/// None of these are fatal to a running relay: the pipeline downgrades
/// each one to "skip this source", "try the next provider", "leave this
/// item for the next cycle" or "start from empty state".
#[derive(Error, Debug)]
pub enum AppError {
    /// A news source could not be read (fetch or parse failure).
    #[error("Source error ({source_name}): {message}")]
    SourceError {
        source_name: String,
        message: String,
    },

    /// A feed or page body could not be parsed into items.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// HTTP request failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// A translation provider failed or returned an unusable result.
    #[error("Translation error ({provider}): {message}")]
    TranslationError { provider: String, message: String },

    /// The publish transport rejected or failed to deliver a message.
    #[error("Publish error: {0}")]
    PublishError(String),

    /// Persisted state could not be read or written.
    #[error("State error: {0}")]
    StateError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying on a later cycle.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimitExceeded => true,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("HTTP 5")
            }
            AppError::SourceError { message, .. } => {
                message.contains("timeout") || message.contains("connect")
            }
            _ => false,
        }
    }

    /// Wrap any error as a [`AppError::SourceError`] tagged with the source name.
    pub fn source_failure(source_name: impl Into<String>, err: impl std::fmt::Display) -> Self {
        AppError::SourceError {
            source_name: source_name.into(),
            message: err.to_string(),
        }
    }
}
