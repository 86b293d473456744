//! Free-text output.

use flowkit_core::{Message, ModelResponseChunk, OutputConfig};
use serde_json::Value as JsonValue;

use super::Formatter;
use crate::error::Result;

/// Passes model text through unchanged.
#[derive(Debug, Clone, Default)]
pub struct TextFormat;

impl TextFormat {
    /// Create the text format. Any schema is ignored.
    pub fn new() -> Self {
        Self
    }
}

impl Formatter for TextFormat {
    fn name(&self) -> &str {
        "text"
    }

    fn instructions(&self) -> Option<String> {
        None
    }

    fn config(&self) -> OutputConfig {
        OutputConfig::new()
            .with_format("text")
            .with_content_type(mime::TEXT_PLAIN.as_ref())
    }

    fn parse_output(&self, message: &Message) -> Result<JsonValue> {
        Ok(JsonValue::String(message.text()))
    }

    fn parse_chunk(&mut self, chunk: &ModelResponseChunk) -> Result<Option<JsonValue>> {
        Ok(Some(JsonValue::String(chunk.text_content())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let mut fmt = TextFormat::new();
        assert!(fmt.instructions().is_none());
        assert_eq!(fmt.config().content_type.as_deref(), Some("text/plain"));
        assert_eq!(
            fmt.parse_output(&Message::model("  hi there ")).unwrap(),
            JsonValue::String("  hi there ".into())
        );
        assert_eq!(
            fmt.parse_chunk(&ModelResponseChunk::text(0, "hi")).unwrap(),
            Some(JsonValue::String("hi".into()))
        );
    }
}
