//! Turning prompt input into template variables.

use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::{PromptError, Result};

/// Template variables.
pub type Variables = JsonMap<String, JsonValue>;

/// Serialize `input` into a variables map.
///
/// Maps are used as-is. Structs contribute their serialized fields, so
/// `#[serde(rename)]` and `#[serde(skip_serializing_if)]` apply. `()` and
/// `None` give an empty map. Anything else is rejected.
pub fn to_variables<T: Serialize + ?Sized>(input: &T) -> Result<Variables> {
    let value = serde_json::to_value(input).map_err(|e| PromptError::Input(e.to_string()))?;
    value_to_variables(value)
}

/// Convert an already serialized input into a variables map.
pub fn value_to_variables(value: JsonValue) -> Result<Variables> {
    match value {
        JsonValue::Object(map) => Ok(map),
        JsonValue::Null => Ok(Variables::new()),
        other => Err(PromptError::Input(format!(
            "expected an object, got {}",
            kind_name(&other)
        ))),
    }
}

/// Merge `defaults` under `vars`: caller values win.
pub fn merge_defaults(vars: Variables, defaults: Option<&Variables>) -> Variables {
    let Some(defaults) = defaults else {
        return vars;
    };
    let mut merged = defaults.clone();
    merged.extend(vars);
    merged
}

fn kind_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Serialize)]
    struct Request {
        #[serde(rename = "userName")]
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        nickname: Option<String>,
        age: u32,
    }

    #[test]
    fn test_struct_fields_use_serialized_names() {
        let vars = to_variables(&Request {
            name: "Ada".into(),
            nickname: None,
            age: 36,
        })
        .unwrap();
        assert_eq!(JsonValue::Object(vars), json!({"userName": "Ada", "age": 36}));
    }

    #[test]
    fn test_map_and_unit_input() {
        assert_eq!(to_variables(&json!({"a": 1})).unwrap().len(), 1);
        assert!(to_variables(&()).unwrap().is_empty());
        assert!(to_variables(&None::<Request>).unwrap().is_empty());
    }

    #[test]
    fn test_scalar_input_is_rejected() {
        let err = to_variables(&42).unwrap_err();
        assert_eq!(err.to_string(), "invalid prompt input: expected an object, got a number");
    }

    #[test]
    fn test_defaults_merge_under_input() {
        let defaults = value_to_variables(json!({"tone": "formal", "lang": "en"})).unwrap();
        let vars = value_to_variables(json!({"tone": "casual"})).unwrap();
        let merged = merge_defaults(vars, Some(&defaults));
        assert_eq!(JsonValue::Object(merged), json!({"tone": "casual", "lang": "en"}));
    }
}
