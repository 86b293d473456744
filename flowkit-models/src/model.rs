//! The model capability.

use async_trait::async_trait;
use flowkit_core::ModelResponseChunk;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ModelError;
use crate::request::{ModelRequest, ModelResponse};

/// How far a model can enforce an output schema by itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstrainedSupport {
    /// Never.
    #[default]
    None,
    /// Only on requests without tools.
    NoTools,
    /// Always.
    All,
}

/// Feature flags describing what a model can handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supports {
    /// Accepts more than one message.
    pub multiturn: bool,
    /// Can call tools.
    pub tools: bool,
    /// Accepts media parts.
    pub media: bool,
    /// Understands the system role.
    pub system_role: bool,
    /// Native constrained decoding.
    pub constrained: ConstrainedSupport,
}

impl Default for Supports {
    fn default() -> Self {
        Self {
            multiturn: true,
            tools: true,
            media: false,
            system_role: true,
            constrained: ConstrainedSupport::None,
        }
    }
}

/// Descriptive information about a model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Human-friendly label.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    /// Supported features.
    #[serde(default)]
    pub supports: Supports,
}

impl ModelInfo {
    /// Info with default capabilities.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            supports: Supports::default(),
        }
    }

    /// Replace the capability flags.
    #[must_use]
    pub fn with_supports(mut self, supports: Supports) -> Self {
        self.supports = supports;
        self
    }

    /// Set the native constrained-decoding level.
    #[must_use]
    pub fn with_constrained(mut self, constrained: ConstrainedSupport) -> Self {
        self.supports.constrained = constrained;
        self
    }
}

/// Callback receiving streamed chunks.
///
/// Returning an error aborts the generation.
pub type ChunkSink<'a> = dyn FnMut(ModelResponseChunk) -> Result<(), ModelError> + Send + 'a;

/// Core model trait.
///
/// Implementations talk to a provider (or fake one). Passing a `stream`
/// sink asks the model to report chunks as they are produced; the final
/// [`ModelResponse`] is returned either way.
#[async_trait]
pub trait Model: Send + Sync {
    /// Get the model name.
    fn name(&self) -> &str;

    /// Capabilities of the model.
    fn info(&self) -> &ModelInfo;

    /// Generate a response.
    async fn generate(
        &self,
        request: &ModelRequest,
        stream: Option<&mut ChunkSink<'_>>,
    ) -> Result<ModelResponse, ModelError>;
}

/// Shared model for dynamic dispatch.
pub type BoxedModel = Arc<dyn Model>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_supports_defaults() {
        let supports = Supports::default();
        assert!(supports.multiturn && supports.tools && supports.system_role);
        assert!(!supports.media);
        assert_eq!(supports.constrained, ConstrainedSupport::None);
    }

    #[test]
    fn test_constrained_serde() {
        assert_eq!(serde_json::to_value(ConstrainedSupport::NoTools).unwrap(), json!("no-tools"));
        let info: ModelInfo =
            serde_json::from_value(json!({"supports": {"multiturn": false, "tools": false, "media": true, "systemRole": false, "constrained": "all"}}))
                .unwrap();
        assert_eq!(info.supports.constrained, ConstrainedSupport::All);
        assert!(!info.supports.system_role);
    }
}
