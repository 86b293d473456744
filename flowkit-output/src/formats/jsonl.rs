//! Newline-delimited JSON output.

use flowkit_core::{Message, ModelResponseChunk, OutputConfig, Part};
use serde_json::Value as JsonValue;
use tracing::debug;

use super::{content_text, replace_text_parts, ChunkBuffer, Formatter, APPLICATION_JSONL};
use crate::error::{OutputError, Result};
use crate::extract::extract_json_from_markdown;
use crate::partial::parse_partial_json;
use crate::schema::{validate_is_json_array, SchemaValidator};

/// Parses one JSON object per line.
///
/// Lines that do not start with `{` are ignored. The schema must be an array
/// schema; each line is validated against its `items`.
#[derive(Debug, Clone)]
pub struct JsonlFormat {
    schema: JsonValue,
    items: SchemaValidator,
    buffer: ChunkBuffer,
}

impl JsonlFormat {
    /// Create the JSONL format.
    ///
    /// # Errors
    ///
    /// [`OutputError::InvalidArgument`] unless the schema is `type: "array"`
    /// with `items`.
    pub fn new(schema: Option<&JsonValue>) -> Result<Self> {
        let schema = schema
            .filter(|s| validate_is_json_array(s))
            .ok_or_else(|| {
                OutputError::invalid_argument(
                    "jsonl format requires a schema of type 'array' with 'items'",
                )
            })?;
        let items = SchemaValidator::new(&schema["items"])?;
        Ok(Self {
            schema: schema.clone(),
            items,
            buffer: ChunkBuffer::new(),
        })
    }

    /// Parse the object lines of `text`.
    ///
    /// With `allow_partial`, a broken final line is recovered as partial
    /// JSON instead of failing.
    fn parse_lines(text: &str, allow_partial: bool) -> Result<Vec<(JsonValue, String)>> {
        let lines: Vec<&str> = text.split('\n').map(str::trim).collect();
        let last = lines.len().saturating_sub(1);
        let mut out = Vec::new();
        for (i, line) in lines.into_iter().enumerate() {
            if !line.starts_with('{') {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(value) => out.push((value, line.to_string())),
                Err(_) if allow_partial && i == last => {
                    if let Ok(value) = parse_partial_json(line) {
                        out.push((value, line.to_string()));
                    }
                }
                Err(e) => return Err(OutputError::invalid_json(&e, line)),
            }
        }
        Ok(out)
    }
}

impl Formatter for JsonlFormat {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn instructions(&self) -> Option<String> {
        Some(format!(
            "Output should be JSONL format, a sequence of JSON objects (one per line) separated by a newline '\\n' character. Each line should be a JSON object conforming to the following schema:\n\n```{}```",
            self.items.schema()
        ))
    }

    fn config(&self) -> OutputConfig {
        OutputConfig::new()
            .with_format("jsonl")
            .with_schema(self.schema.clone())
            .with_content_type(APPLICATION_JSONL)
    }

    fn parse_output(&self, message: &Message) -> Result<JsonValue> {
        let json_parts: Vec<&Part> = message
            .content
            .iter()
            .filter(|p| p.is_json_content())
            .collect();

        let parsed = if json_parts.is_empty() {
            let text = extract_json_from_markdown(&content_text(message));
            Self::parse_lines(&text, false)?
        } else {
            json_parts
                .into_iter()
                .filter_map(|p| p.as_json().or_else(|| p.as_text()))
                .map(|raw| {
                    let raw = raw.trim();
                    serde_json::from_str(raw)
                        .map(|v| (v, raw.to_string()))
                        .map_err(|e| OutputError::invalid_json(&e, raw))
                })
                .collect::<Result<Vec<_>>>()?
        };

        let mut items = Vec::with_capacity(parsed.len());
        for (value, line) in parsed {
            self.items.validate_with_fragment(&value, &line)?;
            items.push(value);
        }
        Ok(JsonValue::Array(items))
    }

    fn parse_chunk(&mut self, chunk: &ModelResponseChunk) -> Result<Option<JsonValue>> {
        self.buffer.push(chunk);
        let unread = self.buffer.unread();

        let (complete, tail) = match unread.rfind('\n') {
            Some(nl) => (&unread[..=nl], &unread[nl + 1..]),
            None => ("", unread),
        };

        let mut items = Vec::new();
        for line in complete.split('\n').map(str::trim) {
            if !line.starts_with('{') {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(value) => items.push(value),
                Err(e) => debug!(error = %e, line, "Skipping malformed JSONL line"),
            }
        }

        let tail = tail.trim();
        if tail.starts_with('{') {
            if let Ok(value) = parse_partial_json(tail) {
                items.push(value);
            }
        }

        let consumed = complete.len();
        let cursor = self.buffer.cursor() + consumed;
        self.buffer.set_cursor(cursor);

        Ok((!items.is_empty()).then_some(JsonValue::Array(items)))
    }

    fn parse_message(&self, message: &Message) -> Result<Message> {
        if message.content.iter().any(Part::is_json_content) {
            return Ok(message.clone());
        }
        let text = extract_json_from_markdown(&content_text(message));
        let parts = Self::parse_lines(&text, false)?
            .into_iter()
            .map(|(_, line)| Part::json(line))
            .collect();
        Ok(replace_text_parts(message, parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowkit_core::Role;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> JsonValue {
        json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {"id": {"type": "integer"}, "name": {"type": "string"}},
                "required": ["id"]
            }
        })
    }

    #[test]
    fn test_requires_array_schema() {
        for bad in [None, Some(json!({"type": "object"})), Some(json!({"type": "array"}))] {
            let err = JsonlFormat::new(bad.as_ref()).unwrap_err();
            assert!(matches!(err, OutputError::InvalidArgument(_)));
        }
    }

    #[test]
    fn test_instructions_embed_items_schema() {
        let fmt = JsonlFormat::new(Some(&schema())).unwrap();
        let text = fmt.instructions().unwrap();
        assert!(text.starts_with("Output should be JSONL format"));
        assert!(text.contains("\"required\":[\"id\"]"));
        assert!(!text.contains("\"items\""));
        assert_eq!(fmt.config().content_type.as_deref(), Some("application/jsonl"));
    }

    #[test]
    fn test_lines_in_order_and_prose_ignored() {
        let fmt = JsonlFormat::new(Some(&schema())).unwrap();
        let lines: Vec<String> = (1..=5).map(|i| format!("{{\"id\": {i}}}")).collect();
        let text = format!("Here they are:\n{}\nDone.", lines.join("\n"));
        let out = fmt.parse_output(&Message::model(text)).unwrap();
        let ids: Vec<i64> = out
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_violating_line_fails_naming_it() {
        let fmt = JsonlFormat::new(Some(&schema())).unwrap();
        let text = "{\"id\": 1}\n{\"id\": \"two\"}\n{\"id\": 3}";
        let err = fmt.parse_output(&Message::model(text)).unwrap_err();
        match err {
            OutputError::SchemaViolation { fragment, .. } => assert_eq!(fragment, "{\"id\": \"two\"}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_legacy_split_matches_blob() {
        let fmt = JsonlFormat::new(Some(&schema())).unwrap();
        let blob = Message::model("{\"id\": 1}\n{\"id\": 2, \"name\": \"b\"}");
        let split = fmt.parse_message(&blob).unwrap();
        assert_eq!(split.content.len(), 2);
        assert!(split.content.iter().all(Part::is_json));
        assert_eq!(fmt.parse_output(&split).unwrap(), fmt.parse_output(&blob).unwrap());

        let typed = Message::new(
            Role::Model,
            vec![
                Part::text_with_type("{\"id\": 1}", "application/json"),
                Part::text_with_type("{\"id\": 2, \"name\": \"b\"}", "application/json"),
            ],
        );
        assert_eq!(fmt.parse_output(&typed).unwrap(), fmt.parse_output(&blob).unwrap());
    }

    #[test]
    fn test_streaming_partial_last_line_not_consumed() {
        let mut fmt = JsonlFormat::new(Some(&schema())).unwrap();

        let first = fmt
            .parse_chunk(&ModelResponseChunk::text(0, "{\"id\": 1}\n{\"id\": 2, \"na"))
            .unwrap();
        assert_eq!(first, Some(json!([{"id": 1}, {"id": 2}])));

        let second = fmt
            .parse_chunk(&ModelResponseChunk::text(0, "me\": \"b\"}\n"))
            .unwrap();
        assert_eq!(second, Some(json!([{"id": 2, "name": "b"}])));

        let third = fmt.parse_chunk(&ModelResponseChunk::text(0, "not json\n")).unwrap();
        assert_eq!(third, None);
    }

    #[test]
    fn test_streaming_resets_on_new_index() {
        let mut fmt = JsonlFormat::new(Some(&schema())).unwrap();
        fmt.parse_chunk(&ModelResponseChunk::text(0, "{\"id\": 1}\n{\"id\"")).unwrap();
        let out = fmt.parse_chunk(&ModelResponseChunk::text(1, "{\"id\": 9}")).unwrap();
        assert_eq!(out, Some(json!([{"id": 9}])));
    }
}
