//! Tool definitions sent to models.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Describes a tool to the model.
///
/// Definitions are derived once from a registered [`Tool`](crate::Tool) and
/// treated as immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Tool name (must be a valid identifier).
    pub name: String,

    /// Human-readable description of what the tool does.
    pub description: String,

    /// JSON Schema for the tool's input.
    #[serde(default = "empty_object_schema")]
    pub input_schema: JsonValue,

    /// JSON Schema for the tool's output, if declared.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output_schema: Option<JsonValue>,
}

fn empty_object_schema() -> JsonValue {
    serde_json::json!({"type": "object", "properties": {}})
}

impl ToolDefinition {
    /// Create a definition accepting an empty object.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: empty_object_schema(),
            output_schema: None,
        }
    }

    /// Set the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: impl Into<JsonValue>) -> Self {
        self.input_schema = schema.into();
        self
    }

    /// Set the output schema.
    #[must_use]
    pub fn with_output_schema(mut self, schema: impl Into<JsonValue>) -> Self {
        self.output_schema = Some(schema.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_serialize_camel_case() {
        let def = ToolDefinition::new("weather", "Current weather")
            .with_input_schema(json!({"type": "object", "properties": {"city": {"type": "string"}}}))
            .with_output_schema(json!({"type": "string"}));
        let value = serde_json::to_value(&def).unwrap();
        assert_eq!(value["inputSchema"]["properties"]["city"]["type"], "string");
        assert_eq!(value["outputSchema"], json!({"type": "string"}));
    }

    #[test]
    fn test_deserialize_defaults_input_schema() {
        let def: ToolDefinition =
            serde_json::from_value(json!({"name": "noop", "description": ""})).unwrap();
        assert_eq!(def.input_schema["type"], "object");
        assert!(def.output_schema.is_none());
    }
}
