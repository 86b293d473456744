//! Model-related error types.

use thiserror::Error;

/// Model-related errors.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Provider-level error.
    #[error("API error: {message}")]
    Api {
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },

    /// The model returned something unusable.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The request uses a feature the model does not support.
    #[error("Model '{model}' does not support {feature}")]
    Unsupported {
        /// Model name.
        model: String,
        /// The unsupported feature.
        feature: String,
    },

    /// The streaming callback rejected a chunk.
    #[error("Stream callback failed: {0}")]
    Stream(String),

    /// Request cancelled.
    #[error("Request cancelled")]
    Cancelled,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ModelError {
    /// Create an API error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
            code: None,
        }
    }

    /// Create an API error with code.
    pub fn api_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// Create an unsupported-feature error.
    pub fn unsupported(model: impl Into<String>, feature: impl Into<String>) -> Self {
        Self::Unsupported {
            model: model.into(),
            feature: feature.into(),
        }
    }

    /// Create a stream callback error.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream(message.into())
    }
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
