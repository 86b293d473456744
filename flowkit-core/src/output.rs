//! Output configuration carried on model requests.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Describes the output a request expects from the model.
///
/// `constrained = true` asserts the model should natively enforce `schema`.
/// `false` means either no schema was requested or the constraint is being
/// simulated through instructions injected into the prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    /// Format name (`text`, `json`, `jsonl`, `enum`, `array`, ...).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub format: Option<String>,
    /// JSON schema the output must conform to.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schema: Option<JsonValue>,
    /// Whether the model should natively constrain decoding to `schema`.
    #[serde(default)]
    pub constrained: bool,
    /// Content type of the expected output.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content_type: Option<String>,
}

impl OutputConfig {
    /// Create an empty output config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the format name.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Set the schema.
    #[must_use]
    pub fn with_schema(mut self, schema: JsonValue) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Set the constrained flag.
    #[must_use]
    pub fn with_constrained(mut self, constrained: bool) -> Self {
        self.constrained = constrained;
        self
    }

    /// Set the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Whether native constrained decoding is being asked for.
    pub fn wants_constrained(&self) -> bool {
        self.constrained && self.schema.is_some()
    }
}
