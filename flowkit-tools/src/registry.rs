//! Tool registry for managing multiple tools.

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::debug;

use crate::{
    definition::ToolDefinition,
    errors::{ToolError, ToolResult},
    tool::{BoxedTool, Tool},
};

/// Registry of tools, keyed by name.
///
/// Registration order is preserved, so [`definitions`](Self::definitions)
/// is stable across calls.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, BoxedTool>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Duplicate`] if the name is taken.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<&mut Self, ToolError> {
        self.register_boxed(Arc::new(tool))
    }

    /// Register a shared tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Duplicate`] if the name is taken.
    pub fn register_boxed(&mut self, tool: BoxedTool) -> Result<&mut Self, ToolError> {
        let name = tool.name();
        if self.tools.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }
        debug!(tool = %name, "Registering tool");
        self.tools.insert(name, tool);
        Ok(self)
    }

    /// Register a tool, replacing any existing tool with the same name.
    pub fn register_replace<T: Tool + 'static>(&mut self, tool: T) -> &mut Self {
        let tool: BoxedTool = Arc::new(tool);
        self.tools.insert(tool.name(), tool);
        self
    }

    /// Get a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BoxedTool> {
        self.tools.get(name)
    }

    /// Look up several tools by name, preserving the requested order.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotFound`] for the first unknown name.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<BoxedTool>, ToolError> {
        names
            .iter()
            .map(|n| {
                self.get(n.as_ref())
                    .cloned()
                    .ok_or_else(|| ToolError::not_found(n.as_ref()))
            })
            .collect()
    }

    /// Call a tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotFound`] if no tool with the given name exists,
    /// otherwise whatever the tool itself returns.
    pub async fn call(&self, name: &str, input: JsonValue) -> ToolResult {
        let tool = self.get(name).ok_or_else(|| ToolError::not_found(name))?;
        tool.run_raw(input).await
    }

    /// All tool definitions, in registration order.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Check if a tool exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get all tool names.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Get the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SyncFunctionTool;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn echo(name: &'static str) -> SyncFunctionTool<impl Fn(JsonValue) -> ToolResult + Send + Sync> {
        SyncFunctionTool::new(name, "Echo", json!({"type": "object"}), Ok)
    }

    #[test]
    fn test_register_preserves_order() {
        let mut registry = ToolRegistry::new();
        registry.register(echo("b")).unwrap();
        registry.register(echo("a")).unwrap();
        assert_eq!(registry.names(), vec!["b", "a"]);
        let defs: Vec<_> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(defs, vec!["b", "a"]);
    }

    #[test]
    fn test_register_duplicate_fails() {
        let mut registry = ToolRegistry::new();
        registry.register(echo("a")).unwrap();
        assert!(matches!(registry.register(echo("a")), Err(ToolError::Duplicate(n)) if n == "a"));
        registry.register_replace(echo("a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_unknown() {
        let mut registry = ToolRegistry::new();
        registry.register(echo("a")).unwrap();
        assert_eq!(registry.resolve(&["a"]).unwrap().len(), 1);
        let err = registry.resolve(&["a", "missing"]).err().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_call() {
        let mut registry = ToolRegistry::new();
        registry.register(echo("echo")).unwrap();
        assert_eq!(registry.call("echo", json!(5)).await.unwrap(), json!(5));
        assert!(registry.call("nope", json!(5)).await.unwrap_err().is_not_found());
    }
}
