//! Format lookup and defaulting.

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::debug;

use crate::error::{OutputError, Result};
use crate::formats::{ArrayFormat, EnumFormat, FormatHandler, JsonFormat, JsonlFormat, TextFormat};

/// Builds a fresh handler for a schema.
pub type FormatConstructor =
    Arc<dyn Fn(Option<&JsonValue>) -> Result<FormatHandler> + Send + Sync>;

/// Table of output formats by name.
///
/// Starts with `text`, `json`, `jsonl`, `enum` and `array`; more can be
/// registered. Each resolution constructs a new handler, so streaming state
/// is never shared between calls.
#[derive(Clone)]
pub struct FormatRegistry {
    formats: IndexMap<String, FormatConstructor>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("text", |_| Ok(FormatHandler::Text(TextFormat::new())));
        registry.register("json", |s| JsonFormat::new(s).map(FormatHandler::Json));
        registry.register("jsonl", |s| JsonlFormat::new(s).map(FormatHandler::Jsonl));
        registry.register("enum", |s| EnumFormat::new(s).map(FormatHandler::Enum));
        registry.register("array", |s| ArrayFormat::new(s).map(FormatHandler::Array));
        registry
    }
}

impl FormatRegistry {
    /// Registry with the built-in formats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with no formats at all.
    pub fn empty() -> Self {
        Self {
            formats: IndexMap::new(),
        }
    }

    /// Register (or replace) a format.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(Option<&JsonValue>) -> Result<FormatHandler> + Send + Sync + 'static,
    {
        self.formats.insert(name.into(), Arc::new(constructor));
        self
    }

    /// Whether a format is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.formats.contains_key(name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.formats.keys().map(String::as_str).collect()
    }

    /// Pick and construct the handler for a request.
    ///
    /// An empty or missing name defaults to `json` when a schema is given
    /// and to `text` otherwise.
    ///
    /// # Errors
    ///
    /// [`OutputError::UnknownFormat`] for an unregistered name, or whatever
    /// the format's constructor rejects.
    pub fn resolve(&self, schema: Option<&JsonValue>, format: Option<&str>) -> Result<FormatHandler> {
        let name = match format.map(str::trim).filter(|f| !f.is_empty()) {
            Some(name) => name,
            None if schema.is_some() => "json",
            None => "text",
        };
        let constructor = self
            .formats
            .get(name)
            .ok_or_else(|| OutputError::UnknownFormat(name.to_string()))?;
        debug!(format = name, has_schema = schema.is_some(), "Resolved output format");
        constructor(schema)
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("formats", &self.names())
            .finish()
    }
}

/// Resolve a format against the built-in table.
///
/// See [`FormatRegistry::resolve`].
pub fn resolve_format(schema: Option<&JsonValue>, format: Option<&str>) -> Result<FormatHandler> {
    FormatRegistry::default().resolve(schema, format)
}

/// Instructions to send for a handler.
///
/// Non-empty `explicit` instructions always win over the handler's own.
pub fn resolve_instructions(handler: &FormatHandler, explicit: Option<&str>) -> Option<String> {
    match explicit {
        Some(text) if !text.is_empty() => Some(text.to_string()),
        _ => handler.instructions(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::Formatter;
    use flowkit_core::{Message, ModelResponseChunk, OutputConfig};
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(Some(json!({"type": "object"})), None, "json")]
    #[case(Some(json!({"type": "object"})), Some(""), "json")]
    #[case(None, None, "text")]
    #[case(None, Some(""), "text")]
    #[case(None, Some("json"), "json")]
    #[case(Some(json!({"enum": ["a"]})), Some("enum"), "enum")]
    fn test_defaulting(
        #[case] schema: Option<JsonValue>,
        #[case] format: Option<&str>,
        #[case] expected: &str,
    ) {
        let handler = resolve_format(schema.as_ref(), format).unwrap();
        assert_eq!(handler.name(), expected);
    }

    #[test]
    fn test_unknown_format() {
        let err = resolve_format(None, Some("bogus")).unwrap_err();
        assert_eq!(err.to_string(), "invalid output format 'bogus'");
        assert!(resolve_format(Some(&json!({})), Some("bogus")).is_err());
    }

    #[test]
    fn test_constructor_errors_propagate() {
        let err = resolve_format(Some(&json!({"type": "object"})), Some("jsonl")).unwrap_err();
        assert!(matches!(err, OutputError::InvalidArgument(_)));
    }

    #[test]
    fn test_explicit_instructions_win() {
        let handler = resolve_format(Some(&json!({"type": "object"})), None).unwrap();
        assert_eq!(
            resolve_instructions(&handler, Some("Reply with JSON.")).as_deref(),
            Some("Reply with JSON.")
        );
        assert_eq!(resolve_instructions(&handler, Some("")), handler.instructions());
        assert_eq!(resolve_instructions(&handler, None), handler.instructions());
    }

    struct Upper;

    impl Formatter for Upper {
        fn name(&self) -> &str {
            "upper"
        }
        fn instructions(&self) -> Option<String> {
            Some("Shout.".into())
        }
        fn config(&self) -> OutputConfig {
            OutputConfig::new().with_format("upper")
        }
        fn parse_output(&self, message: &Message) -> Result<JsonValue> {
            Ok(JsonValue::String(message.text().to_uppercase()))
        }
        fn parse_chunk(&mut self, chunk: &ModelResponseChunk) -> Result<Option<JsonValue>> {
            Ok(Some(JsonValue::String(chunk.text_content().to_uppercase())))
        }
    }

    #[test]
    fn test_custom_format() {
        let mut registry = FormatRegistry::new();
        registry.register("upper", |_| Ok(FormatHandler::Custom(Box::new(Upper))));
        assert_eq!(registry.names(), vec!["text", "json", "jsonl", "enum", "array", "upper"]);
        let handler = registry.resolve(None, Some("upper")).unwrap();
        assert_eq!(handler.parse_output(&Message::model("hey")).unwrap(), json!("HEY"));
    }
}
