//! Error types for output parsing and validation.

use thiserror::Error;

/// Longest fragment of offending text kept on an error.
const MAX_FRAGMENT_LEN: usize = 200;

/// Errors raised while resolving formats or parsing model output.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OutputError {
    /// The output could not be parsed as JSON.
    #[error("invalid JSON: {message} (in `{fragment}`)")]
    InvalidJson {
        /// Parser message.
        message: String,
        /// The text that failed to parse.
        fragment: String,
    },

    /// The output parsed but does not conform to the schema.
    #[error("schema violation at '{path}': {message} (in `{fragment}`)")]
    SchemaViolation {
        /// JSON pointer of the violating value (empty for the root).
        path: String,
        /// Validator message.
        message: String,
        /// The offending output.
        fragment: String,
    },

    /// The format cannot be used with the given schema.
    #[error("INVALID_ARGUMENT: {0}")]
    InvalidArgument(String),

    /// The value is not one of the allowed enum values.
    #[error("value '{value}' is not one of the allowed values: {}", .allowed.join(", "))]
    EnumMismatch {
        /// The cleaned value.
        value: String,
        /// The valid set.
        allowed: Vec<String>,
    },

    /// The schema itself is not a valid JSON Schema.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// No format is registered under the requested name.
    #[error("invalid output format '{0}'")]
    UnknownFormat(String),

    /// Nothing could be recovered from incomplete JSON.
    #[error("no JSON structure recoverable from `{0}`")]
    PartialParse(String),
}

impl OutputError {
    /// Create an invalid JSON error from a parser error and the input text.
    pub fn invalid_json(err: &serde_json::Error, text: &str) -> Self {
        Self::InvalidJson {
            message: err.to_string(),
            fragment: fragment(text),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Whether this error is a validation failure of model output.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidJson { .. } | Self::SchemaViolation { .. } | Self::EnumMismatch { .. }
        )
    }

    /// Whether this error reflects a format/schema configuration mistake.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::InvalidSchema(_) | Self::UnknownFormat(_)
        )
    }
}

/// Shorten text for inclusion in an error.
pub(crate) fn fragment(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= MAX_FRAGMENT_LEN {
        return text.to_string();
    }
    let mut out: String = text.chars().take(MAX_FRAGMENT_LEN).collect();
    out.push_str("...");
    out
}

/// Result type alias using [`OutputError`].
pub type Result<T> = std::result::Result<T, OutputError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_mismatch_names_value_and_set() {
        let err = OutputError::EnumMismatch {
            value: "purple".into(),
            allowed: vec!["red".into(), "green".into()],
        };
        assert_eq!(
            err.to_string(),
            "value 'purple' is not one of the allowed values: red, green"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn test_fragment_truncates() {
        let long = "x".repeat(500);
        let short = fragment(&long);
        assert!(short.ends_with("..."));
        assert_eq!(short.len(), MAX_FRAGMENT_LEN + 3);
    }

    #[test]
    fn test_classification() {
        assert!(OutputError::UnknownFormat("bogus".into()).is_configuration());
        assert!(!OutputError::PartialParse("{".into()).is_validation());
    }
}
