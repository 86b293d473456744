//! JSON Schema validation helpers.

use jsonschema::JSONSchema;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::error::{fragment, OutputError, Result};

/// Whether `schema` declares `type: "array"` with an `items` sub-schema.
pub fn validate_is_json_array(schema: &JsonValue) -> bool {
    schema.get("type").and_then(JsonValue::as_str) == Some("array")
        && schema.get("items").is_some_and(JsonValue::is_object)
}

/// Validate `value` against `schema`.
///
/// # Errors
///
/// [`OutputError::InvalidSchema`] if the schema does not compile, otherwise
/// [`OutputError::SchemaViolation`] naming the first violating field.
pub fn validate_value(value: &JsonValue, schema: &JsonValue) -> Result<()> {
    SchemaValidator::new(schema)?.validate(value)
}

/// Validate raw JSON bytes against raw schema bytes, returning the parsed value.
///
/// # Errors
///
/// [`OutputError::InvalidJson`] if either input is not JSON, otherwise as
/// [`validate_value`].
pub fn validate_raw(data: &[u8], schema: &[u8]) -> Result<JsonValue> {
    let schema: JsonValue = serde_json::from_slice(schema)
        .map_err(|e| OutputError::InvalidSchema(e.to_string()))?;
    let value: JsonValue = serde_json::from_slice(data)
        .map_err(|e| OutputError::invalid_json(&e, &String::from_utf8_lossy(data)))?;
    validate_value(&value, &schema)?;
    Ok(value)
}

/// A compiled schema, reusable across many values.
#[derive(Clone)]
pub struct SchemaValidator {
    schema: JsonValue,
    compiled: Arc<JSONSchema>,
}

impl SchemaValidator {
    /// Compile a schema.
    ///
    /// # Errors
    ///
    /// [`OutputError::InvalidSchema`] if the schema is not valid JSON Schema.
    pub fn new(schema: &JsonValue) -> Result<Self> {
        let compiled =
            JSONSchema::compile(schema).map_err(|e| OutputError::InvalidSchema(e.to_string()))?;
        Ok(Self {
            schema: schema.clone(),
            compiled: Arc::new(compiled),
        })
    }

    /// The source schema.
    pub fn schema(&self) -> &JsonValue {
        &self.schema
    }

    /// Validate a value.
    ///
    /// # Errors
    ///
    /// [`OutputError::SchemaViolation`] for the first error reported.
    pub fn validate(&self, value: &JsonValue) -> Result<()> {
        let text = value.to_string();
        self.validate_with_fragment(value, &text)
    }

    /// Validate a value, reporting `source` as the offending text.
    pub(crate) fn validate_with_fragment(&self, value: &JsonValue, source: &str) -> Result<()> {
        let Err(mut errors) = self.compiled.validate(value) else {
            return Ok(());
        };
        match errors.next() {
            Some(err) => Err(OutputError::SchemaViolation {
                path: err.instance_path.to_string(),
                message: err.to_string(),
                fragment: fragment(source),
            }),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("schema", &self.schema)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person() -> JsonValue {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer"}
            },
            "required": ["name"]
        })
    }

    #[test]
    fn test_validate_is_json_array() {
        assert!(validate_is_json_array(&json!({"type": "array", "items": {"type": "object"}})));
        assert!(!validate_is_json_array(&json!({"type": "array"})));
        assert!(!validate_is_json_array(&json!({"type": "object", "items": {}})));
    }

    #[test]
    fn test_validate_value_ok() {
        assert!(validate_value(&json!({"name": "Ada", "age": 36}), &person()).is_ok());
    }

    #[test]
    fn test_validate_value_names_field() {
        let err = validate_value(&json!({"name": "Ada", "age": "old"}), &person()).unwrap_err();
        match err {
            OutputError::SchemaViolation { path, .. } => assert_eq!(path, "/age"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_value_missing_required() {
        let err = validate_value(&json!({"age": 3}), &person()).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_validate_raw() {
        let schema = serde_json::to_vec(&person()).unwrap();
        let value = validate_raw(br#"{"name": "Grace"}"#, &schema).unwrap();
        assert_eq!(value["name"], "Grace");
        assert!(matches!(
            validate_raw(b"{nope", &schema),
            Err(OutputError::InvalidJson { .. })
        ));
    }

    #[test]
    fn test_invalid_schema() {
        let err = SchemaValidator::new(&json!({"type": 12})).unwrap_err();
        assert!(matches!(err, OutputError::InvalidSchema(_)));
    }
}
