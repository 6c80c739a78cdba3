//! Error types for Lodestone

/// Result type alias using Lodestone's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Lodestone operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Classification stage errors (stages 1-4)
    #[error("classifier error: {0}")]
    Classifier(String),

    /// Relational store errors
    #[error("storage error: {0}")]
    Storage(String),

    /// Document store errors
    #[error("document store error: {0}")]
    Document(String),

    /// Remote model service errors
    #[error("model service error: {0}")]
    Model(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed input that will never succeed on retry
    #[error("validation error: {0}")]
    Validation(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Timeout errors
    #[error("operation timed out")]
    Timeout,

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new classifier error
    pub fn classifier(msg: impl Into<String>) -> Self {
        Self::Classifier(msg.into())
    }

    /// Create a new storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new document store error
    pub fn document(msg: impl Into<String>) -> Self {
        Self::Document(msg.into())
    }

    /// Create a new model service error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether retrying the same operation can succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Validation(_) | Self::Config(_))
    }
}
