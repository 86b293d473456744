//! Tool-specific error types.

use thiserror::Error;

/// Errors that can occur during tool execution or registration.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool execution failed.
    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    /// Invalid arguments provided to the tool.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Tool not found in registry.
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// A tool with the same name is already registered.
    #[error("Tool '{0}' is already registered")]
    Duplicate(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ToolError {
    /// Create an execution failure.
    #[must_use]
    pub fn execution_failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    /// Create an invalid arguments error.
    #[must_use]
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Whether the error means the tool does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for tool execution.
pub type ToolResult<T = serde_json::Value> = Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ToolError::not_found("calc").to_string(), "Tool not found: calc");
        assert!(ToolError::not_found("calc").is_not_found());
        assert!(!ToolError::execution_failed("boom").is_not_found());
    }

    #[test]
    fn test_from_anyhow() {
        let err: ToolError = anyhow::anyhow!("upstream down").into();
        assert_eq!(err.to_string(), "upstream down");
    }
}
