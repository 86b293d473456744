//! Single enum value output.

use flowkit_core::{Message, ModelResponseChunk, OutputConfig, Part};
use serde_json::Value as JsonValue;

use super::{content_text, replace_text_parts, ChunkBuffer, Formatter, TEXT_ENUM};
use crate::error::{OutputError, Result};

/// Accepts exactly one of a fixed set of strings.
#[derive(Debug, Clone)]
pub struct EnumFormat {
    schema: JsonValue,
    allowed: Vec<String>,
    buffer: ChunkBuffer,
}

impl EnumFormat {
    /// Create the enum format.
    ///
    /// The allowed values come from the schema's top-level `enum`, or else
    /// from the first property that declares one.
    ///
    /// # Errors
    ///
    /// [`OutputError::InvalidArgument`] if no string `enum` list is found.
    pub fn new(schema: Option<&JsonValue>) -> Result<Self> {
        let schema = schema.ok_or_else(|| {
            OutputError::invalid_argument("enum format requires a schema with an 'enum' list")
        })?;
        let allowed = enum_values(schema)
            .filter(|values| !values.is_empty())
            .ok_or_else(|| {
                OutputError::invalid_argument(
                    "enum format requires a schema with a non-empty 'enum' list of strings",
                )
            })?;
        Ok(Self {
            schema: schema.clone(),
            allowed,
            buffer: ChunkBuffer::new(),
        })
    }

    /// The allowed values.
    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    fn check(&self, text: &str) -> Result<String> {
        let value = clean_enum_value(text);
        if self.allowed.iter().any(|a| *a == value) {
            Ok(value)
        } else {
            Err(OutputError::EnumMismatch {
                value,
                allowed: self.allowed.clone(),
            })
        }
    }
}

fn enum_values(schema: &JsonValue) -> Option<Vec<String>> {
    let list = schema.get("enum").or_else(|| {
        schema
            .get("properties")?
            .as_object()?
            .values()
            .find_map(|prop| prop.get("enum"))
    })?;
    list.as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

/// Strip surrounding whitespace and quotes.
fn clean_enum_value(text: &str) -> String {
    text.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

impl Formatter for EnumFormat {
    fn name(&self) -> &str {
        "enum"
    }

    fn instructions(&self) -> Option<String> {
        Some(format!(
            "Output should be ONLY one of the following enum values. Do not output any other characters.\n\n{}",
            self.allowed.join("\n")
        ))
    }

    fn config(&self) -> OutputConfig {
        OutputConfig::new()
            .with_format("enum")
            .with_schema(self.schema.clone())
            .with_constrained(true)
            .with_content_type(TEXT_ENUM)
    }

    fn parse_output(&self, message: &Message) -> Result<JsonValue> {
        self.check(&content_text(message)).map(JsonValue::String)
    }

    fn parse_chunk(&mut self, chunk: &ModelResponseChunk) -> Result<Option<JsonValue>> {
        self.buffer.push(chunk);
        let value = clean_enum_value(self.buffer.text());
        Ok((!value.is_empty()).then_some(JsonValue::String(value)))
    }

    fn parse_message(&self, message: &Message) -> Result<Message> {
        let value = self.check(&content_text(message))?;
        Ok(replace_text_parts(message, vec![Part::text(value)]))
    }
}
