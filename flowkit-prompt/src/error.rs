//! Error types for templates and prompt configuration.

use flowkit_output::OutputError;
use std::fmt;
use thiserror::Error;

/// One problem found while validating a prompt configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigConflict {
    /// The option (or option pair) at fault.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ConfigConflict {
    /// Create a conflict for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_conflicts(conflicts: &[ConfigConflict]) -> String {
    conflicts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from template parsing, rendering and prompt configuration.
#[derive(Debug, Error)]
pub enum PromptError {
    /// The template source is malformed.
    #[error("template parse error: {0}")]
    Parse(String),

    /// A helper name was used that is neither built in nor registered.
    #[error("unknown helper '{0}'")]
    UnknownHelper(String),

    /// A partial was referenced that is not registered.
    #[error("unknown partial '{0}'")]
    UnknownPartial(String),

    /// A helper was called with bad arguments or failed.
    #[error("helper '{name}' failed: {message}")]
    Helper {
        /// Helper name.
        name: String,
        /// What went wrong.
        message: String,
    },

    /// Rendering failed for a reason other than a helper.
    #[error("render error: {0}")]
    Render(String),

    /// The prompt input could not be turned into template variables.
    #[error("invalid prompt input: {0}")]
    Input(String),

    /// The prompt configuration is invalid.
    #[error("invalid prompt configuration: {}", join_conflicts(.0))]
    Configuration(Vec<ConfigConflict>),

    /// A user-supplied prompt function failed.
    #[error("{field} function failed: {source}")]
    Function {
        /// Which function (`system`, `prompt` or `messages`).
        field: &'static str,
        /// The underlying error.
        #[source]
        source: anyhow::Error,
    },

    /// Output format resolution failed.
    #[error(transparent)]
    Output(#[from] OutputError),
}

impl PromptError {
    /// Create a helper error.
    pub fn helper(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Helper {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error holding a single conflict.
    pub fn conflict(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration(vec![ConfigConflict::new(field, message)])
    }

    /// Whether this is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// The configuration conflicts, if this is a configuration error.
    pub fn conflicts(&self) -> &[ConfigConflict] {
        match self {
            Self::Configuration(conflicts) => conflicts,
            _ => &[],
        }
    }
}

/// Result type for prompt operations.
pub type Result<T> = std::result::Result<T, PromptError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_configuration_lists_every_conflict() {
        let err = PromptError::Configuration(vec![
            ConfigConflict::new("system", "systemText and systemFn are both set"),
            ConfigConflict::new("maxTurns", "must be at least 1"),
        ]);
        assert!(err.is_configuration());
        assert_eq!(err.conflicts().len(), 2);
        assert_eq!(
            err.to_string(),
            "invalid prompt configuration: system: systemText and systemFn are both set; \
             maxTurns: must be at least 1"
        );
    }

    #[test]
    fn test_helper_error_display() {
        let err = PromptError::helper("role", "unknown role 'narrator'");
        assert_eq!(err.to_string(), "helper 'role' failed: unknown role 'narrator'");
        assert!(err.conflicts().is_empty());
    }
}
