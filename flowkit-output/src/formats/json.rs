//! Single JSON value output.

use flowkit_core::{Message, ModelResponseChunk, OutputConfig, Part};
use serde_json::Value as JsonValue;

use super::{content_text, replace_text_parts, ChunkBuffer, Formatter};
use crate::error::{OutputError, Result};
use crate::extract::extract_json_from_markdown;
use crate::partial::parse_partial_json;
use crate::schema::SchemaValidator;

/// Instructions telling a model to produce JSON conforming to `schema`.
///
/// The schema is embedded as a quoted JSON string.
pub fn default_constrained_instructions(schema: &JsonValue) -> String {
    let quoted = serde_json::to_string(&schema.to_string()).unwrap_or_default();
    format!(
        "Output should be in JSON format and conform to the following schema:\n\n```{quoted}```"
    )
}

/// Parses a single JSON value, optionally validated against a schema.
#[derive(Debug, Clone)]
pub struct JsonFormat {
    validator: Option<SchemaValidator>,
    buffer: ChunkBuffer,
}

impl JsonFormat {
    /// Create the JSON format.
    ///
    /// Without a schema any JSON value is accepted.
    ///
    /// # Errors
    ///
    /// [`OutputError::InvalidSchema`] if the schema does not compile.
    pub fn new(schema: Option<&JsonValue>) -> Result<Self> {
        Ok(Self {
            validator: schema.map(SchemaValidator::new).transpose()?,
            buffer: ChunkBuffer::new(),
        })
    }

    fn parse_text(&self, text: &str) -> Result<JsonValue> {
        let payload = extract_json_from_markdown(text);
        let payload = payload.trim();
        let value: JsonValue =
            serde_json::from_str(payload).map_err(|e| OutputError::invalid_json(&e, payload))?;
        if let Some(validator) = &self.validator {
            validator.validate_with_fragment(&value, payload)?;
        }
        Ok(value)
    }
}

impl Formatter for JsonFormat {
    fn name(&self) -> &str {
        "json"
    }

    fn instructions(&self) -> Option<String> {
        self.validator
            .as_ref()
            .map(|v| default_constrained_instructions(v.schema()))
    }

    fn config(&self) -> OutputConfig {
        let config = OutputConfig::new()
            .with_format("json")
            .with_constrained(true)
            .with_content_type(mime::APPLICATION_JSON.as_ref());
        match &self.validator {
            Some(v) => config.with_schema(v.schema().clone()),
            None => config,
        }
    }

    fn parse_output(&self, message: &Message) -> Result<JsonValue> {
        self.parse_text(&content_text(message))
    }

    fn parse_chunk(&mut self, chunk: &ModelResponseChunk) -> Result<Option<JsonValue>> {
        self.buffer.push(chunk);
        let payload = extract_json_from_markdown(self.buffer.text());
        if payload.trim().is_empty() {
            return Ok(None);
        }
        Ok(parse_partial_json(&payload).ok())
    }

    fn parse_message(&self, message: &Message) -> Result<Message> {
        let text = content_text(message);
        if text.trim().is_empty() {
            return Ok(message.clone());
        }
        let value = self.parse_text(&text)?;
        Ok(replace_text_parts(message, vec![Part::json(value.to_string())]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowkit_core::{Role, ToolRequest};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> JsonValue {
        json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "rating": {"type": "number", "minimum": 0, "maximum": 5},
                "tags": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["title", "rating"]
        })
    }

    #[test]
    fn test_instructions_quote_schema() {
        let fmt = JsonFormat::new(Some(&json!({"type": "string"}))).unwrap();
        assert_eq!(
            fmt.instructions().unwrap(),
            "Output should be in JSON format and conform to the following schema:\n\n```\"{\\\"type\\\":\\\"string\\\"}\"```"
        );
    }

    #[test]
    fn test_config() {
        let config = JsonFormat::new(Some(&schema())).unwrap().config();
        assert_eq!(config.format.as_deref(), Some("json"));
        assert!(config.constrained);
        assert_eq!(config.content_type.as_deref(), Some("application/json"));
        assert_eq!(config.schema, Some(schema()));
    }

    #[test]
    fn test_round_trip_conformant_objects() {
        let fmt = JsonFormat::new(Some(&schema())).unwrap();
        let objects = [
            json!({"title": "Dune", "rating": 4.5}),
            json!({"title": "", "rating": 0, "tags": []}),
            json!({"title": "Émile \"quoted\"\nnewline", "rating": 5, "tags": ["a", "b"]}),
        ];
        for object in objects {
            let compact = Message::model(object.to_string());
            let pretty = Message::model(serde_json::to_string_pretty(&object).unwrap());
            let fenced = Message::model(format!("```json\n{object}\n```"));
            for msg in [compact, pretty, fenced] {
                assert_eq!(fmt.parse_output(&msg).unwrap(), object);
            }
        }
    }

    #[test]
    fn test_invalid_json() {
        let fmt = JsonFormat::new(Some(&schema())).unwrap();
        let err = fmt.parse_output(&Message::model("{\"title\": ")).unwrap_err();
        assert!(matches!(err, OutputError::InvalidJson { .. }));
    }

    #[test]
    fn test_schema_violation() {
        let fmt = JsonFormat::new(Some(&schema())).unwrap();
        let err = fmt
            .parse_output(&Message::model(r#"{"title": "x", "rating": 9}"#))
            .unwrap_err();
        match err {
            OutputError::SchemaViolation { path, fragment, .. } => {
                assert_eq!(path, "/rating");
                assert!(fragment.contains("\"rating\": 9"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_no_schema_accepts_any_json() {
        let fmt = JsonFormat::new(None).unwrap();
        assert!(fmt.instructions().is_none());
        assert_eq!(fmt.parse_output(&Message::model("[1, 2]")).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_streaming_grows_to_final_value() {
        let mut fmt = JsonFormat::new(Some(&schema())).unwrap();
        let full = r#"{"title": "Dune", "rating": 4.5, "tags": ["sci-fi"]}"#;
        let mut last = None;
        for piece in full.as_bytes().chunks(7) {
            let piece = std::str::from_utf8(piece).unwrap();
            last = fmt.parse_chunk(&ModelResponseChunk::text(0, piece)).unwrap();
        }
        assert_eq!(last, Some(fmt.parse_output(&Message::model(full)).unwrap()));
    }

    #[test]
    fn test_streaming_resets_on_new_index() {
        let mut fmt = JsonFormat::new(None).unwrap();
        fmt.parse_chunk(&ModelResponseChunk::text(0, "{\"a\": 1")).unwrap();
        let value = fmt.parse_chunk(&ModelResponseChunk::text(1, "{\"b\": 2")).unwrap();
        assert_eq!(value, Some(json!({"b": 2})));
    }

    #[test]
    fn test_parse_message_normalizes_to_json_part() {
        let fmt = JsonFormat::new(Some(&schema())).unwrap();
        let msg = Message::new(
            Role::Model,
            vec![
                Part::text("```json\n{\"title\": \"x\", \"rating\": 1}\n```"),
                Part::tool_request(ToolRequest::new("lookup", json!({}))),
            ],
        );
        let normalized = fmt.parse_message(&msg).unwrap();
        assert!(normalized.content[0].is_json());
        assert!(normalized.has_tool_requests());
        assert_eq!(
            fmt.parse_output(&normalized).unwrap(),
            json!({"title": "x", "rating": 1})
        );
    }
}
