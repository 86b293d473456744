//! JSON array output, streamed item by item.

use flowkit_core::{Message, ModelResponseChunk, OutputConfig};
use serde_json::Value as JsonValue;

use super::{content_text, ChunkBuffer, Formatter};
use crate::error::{OutputError, Result};
use crate::extract::{extract_items, extract_json_from_markdown};
use crate::schema::SchemaValidator;

/// Parses a JSON array of objects.
///
/// While streaming, each chunk yields only the items completed since the
/// previous chunk.
#[derive(Debug, Clone)]
pub struct ArrayFormat {
    validator: SchemaValidator,
    buffer: ChunkBuffer,
}

impl ArrayFormat {
    /// Create the array format.
    ///
    /// # Errors
    ///
    /// [`OutputError::InvalidArgument`] unless the schema is `type: "array"`.
    pub fn new(schema: Option<&JsonValue>) -> Result<Self> {
        let schema = schema
            .filter(|s| s.get("type").and_then(JsonValue::as_str) == Some("array"))
            .ok_or_else(|| {
                OutputError::invalid_argument("array format requires a schema of type 'array'")
            })?;
        Ok(Self {
            validator: SchemaValidator::new(schema)?,
            buffer: ChunkBuffer::new(),
        })
    }
}

impl Formatter for ArrayFormat {
    fn name(&self) -> &str {
        "array"
    }

    fn instructions(&self) -> Option<String> {
        Some(format!(
            "Output should be a JSON array conforming to the following schema:\n\n```{}```",
            self.validator.schema()
        ))
    }

    fn config(&self) -> OutputConfig {
        OutputConfig::new()
            .with_format("array")
            .with_schema(self.validator.schema().clone())
            .with_constrained(true)
            .with_content_type(mime::APPLICATION_JSON.as_ref())
    }

    fn parse_output(&self, message: &Message) -> Result<JsonValue> {
        let payload = extract_json_from_markdown(&content_text(message));
        let payload = payload.trim();
        let value: JsonValue =
            serde_json::from_str(payload).map_err(|e| OutputError::invalid_json(&e, payload))?;
        self.validator.validate_with_fragment(&value, payload)?;
        Ok(value)
    }

    fn parse_chunk(&mut self, chunk: &ModelResponseChunk) -> Result<Option<JsonValue>> {
        self.buffer.push(chunk);
        let (items, cursor) = extract_items(self.buffer.text(), self.buffer.cursor());
        self.buffer.set_cursor(cursor);
        Ok((!items.is_empty()).then_some(JsonValue::Array(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> JsonValue {
        json!({"type": "array", "items": {"type": "object", "properties": {"n": {"type": "integer"}}}})
    }

    #[test]
    fn test_requires_array_schema() {
        assert!(matches!(
            ArrayFormat::new(Some(&json!({"type": "object"}))),
            Err(OutputError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_parse_output_fenced() {
        let fmt = ArrayFormat::new(Some(&schema())).unwrap();
        let out = fmt
            .parse_output(&Message::model("```json\n[{\"n\": 1}, {\"n\": 2}]\n```"))
            .unwrap();
        assert_eq!(out, json!([{"n": 1}, {"n": 2}]));
        assert!(fmt.parse_output(&Message::model("[{\"n\": \"x\"}]")).is_err());
    }

    #[test]
    fn test_streaming_yields_new_items_only() {
        let mut fmt = ArrayFormat::new(Some(&schema())).unwrap();
        assert_eq!(fmt.parse_chunk(&ModelResponseChunk::text(0, "[{\"n\": 1}, {\"n")).unwrap(), Some(json!([{"n": 1}])));
        assert_eq!(fmt.parse_chunk(&ModelResponseChunk::text(0, "\": 2}")).unwrap(), Some(json!([{"n": 2}])));
        assert_eq!(fmt.parse_chunk(&ModelResponseChunk::text(0, "]")).unwrap(), None);
    }
}
