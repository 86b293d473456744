//! The tool capability and closure-backed implementations.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::future::Future;
use std::sync::Arc;

use crate::{definition::ToolDefinition, errors::ToolResult};

/// A callable tool.
///
/// The generation loop only relies on [`name`](Tool::name) and
/// [`run_raw`](Tool::run_raw); how a tool does its work is its own business.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use flowkit_tools::{Tool, ToolDefinition, ToolResult};
/// use serde_json::{json, Value};
///
/// struct Greet;
///
/// #[async_trait]
/// impl Tool for Greet {
///     fn definition(&self) -> ToolDefinition {
///         ToolDefinition::new("greet", "Greet someone")
///     }
///
///     async fn run_raw(&self, input: Value) -> ToolResult {
///         let name = input["name"].as_str().unwrap_or("World");
///         Ok(json!(format!("Hello, {name}!")))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's definition.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with raw JSON input.
    async fn run_raw(&self, input: JsonValue) -> ToolResult;

    /// The tool name.
    fn name(&self) -> String {
        self.definition().name
    }
}

/// Type-erased shared tool.
pub type BoxedTool = Arc<dyn Tool>;

/// Wrapper for async closure tools.
pub struct FunctionTool<F> {
    definition: ToolDefinition,
    function: F,
}

impl<F> FunctionTool<F> {
    /// Create a new function tool.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: impl Into<JsonValue>,
        function: F,
    ) -> Self {
        Self {
            definition: ToolDefinition::new(name, description).with_input_schema(input_schema),
            function,
        }
    }

    /// Declare the output schema.
    #[must_use]
    pub fn with_output_schema(mut self, schema: impl Into<JsonValue>) -> Self {
        self.definition = self.definition.with_output_schema(schema);
        self
    }
}

#[async_trait]
impl<F, Fut> Tool for FunctionTool<F>
where
    F: Fn(JsonValue) -> Fut + Send + Sync,
    Fut: Future<Output = ToolResult> + Send,
{
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn run_raw(&self, input: JsonValue) -> ToolResult {
        (self.function)(input).await
    }

    fn name(&self) -> String {
        self.definition.name.clone()
    }
}

impl<F> std::fmt::Debug for FunctionTool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.definition.name)
            .field("description", &self.definition.description)
            .finish()
    }
}

/// Wrapper for tools that don't need async.
pub struct SyncFunctionTool<F> {
    definition: ToolDefinition,
    function: F,
}

impl<F> SyncFunctionTool<F>
where
    F: Fn(JsonValue) -> ToolResult + Send + Sync,
{
    /// Create a new sync function tool.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: impl Into<JsonValue>,
        function: F,
    ) -> Self {
        Self {
            definition: ToolDefinition::new(name, description).with_input_schema(input_schema),
            function,
        }
    }
}

#[async_trait]
impl<F> Tool for SyncFunctionTool<F>
where
    F: Fn(JsonValue) -> ToolResult + Send + Sync,
{
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn run_raw(&self, input: JsonValue) -> ToolResult {
        (self.function)(input)
    }

    fn name(&self) -> String {
        self.definition.name.clone()
    }
}

impl<F> std::fmt::Debug for SyncFunctionTool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncFunctionTool")
            .field("name", &self.definition.name)
            .finish()
    }
}
