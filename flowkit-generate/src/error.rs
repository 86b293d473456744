//! Generation error types.

use flowkit_models::ModelError;
use flowkit_output::OutputError;
use flowkit_prompt::PromptError;
use flowkit_tools::ToolError;
use thiserror::Error;

/// Errors that can occur while driving a generation.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The call was configured inconsistently.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested model is not registered.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// The requested prompt is not registered.
    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    /// Model returned an error.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// A tool was missing or failed.
    #[error("Tool '{tool_name}' failed: {source}")]
    Tool {
        /// Name of the tool.
        tool_name: String,
        /// The underlying error.
        #[source]
        source: ToolError,
    },

    /// The model output did not match the requested format.
    #[error("Output validation failed: {0}")]
    Validation(#[source] OutputError),

    /// The model kept requesting tools past the turn limit.
    #[error("'{name}' exceeded the turn limit after {turns} turns")]
    MaxTurnsExceeded {
        /// Prompt name.
        name: String,
        /// Model invocations made.
        turns: usize,
    },

    /// The generation was cancelled.
    #[error("Generation was cancelled")]
    Cancelled,

    /// Prompt rendering or configuration failed.
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// The streaming callback failed.
    #[error("Stream callback failed: {0}")]
    Stream(#[source] anyhow::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GenerateError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a tool error.
    pub fn tool(tool_name: impl Into<String>, source: ToolError) -> Self {
        Self::Tool {
            tool_name: tool_name.into(),
            source,
        }
    }

    /// Whether the call was misconfigured.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Configuration(_) | Self::ModelNotFound(_) | Self::PromptNotFound(_) => true,
            Self::Prompt(e) => e.is_configuration(),
            _ => false,
        }
    }

    /// Whether the model output failed validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Whether a tool was missing or failed.
    pub fn is_tool_error(&self) -> bool {
        matches!(self, Self::Tool { .. })
    }

    /// Whether the turn limit was hit.
    pub fn is_turn_limit(&self) -> bool {
        matches!(self, Self::MaxTurnsExceeded { .. })
    }

    /// Whether the generation was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<OutputError> for GenerateError {
    fn from(err: OutputError) -> Self {
        if err.is_configuration() {
            Self::Configuration(err.to_string())
        } else {
            Self::Validation(err)
        }
    }
}

/// Result type for generation.
pub type Result<T> = std::result::Result<T, GenerateError>;

#[cfg(test)]
mod tests {
    use super::*;
    use flowkit_prompt::ConfigConflict;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_output_errors_are_split_by_kind() {
        let err: GenerateError = OutputError::UnknownFormat("bogus".into()).into();
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "Configuration error: invalid output format 'bogus'");

        let err: GenerateError = OutputError::EnumMismatch {
            value: "purple".into(),
            allowed: vec!["red".into(), "blue".into()],
        }
        .into();
        assert!(err.is_validation());
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_prompt_configuration_counts_as_configuration() {
        let err: GenerateError =
            PromptError::Configuration(vec![ConfigConflict::new("system", "both set")]).into();
        assert!(err.is_configuration());

        let err: GenerateError = PromptError::UnknownHelper("shout".into()).into();
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_tool_and_turn_limit_messages() {
        let err = GenerateError::tool("lookup", ToolError::not_found("lookup"));
        assert!(err.is_tool_error());
        assert_eq!(err.to_string(), "Tool 'lookup' failed: Tool not found: lookup");

        let err = GenerateError::MaxTurnsExceeded {
            name: "weather".into(),
            turns: 3,
        };
        assert!(err.is_turn_limit());
        assert_eq!(err.to_string(), "'weather' exceeded the turn limit after 3 turns");
    }
}
