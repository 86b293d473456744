//! The registry a generation resolves names against.

use flowkit_models::{BoxedModel, ConstrainedGeneration, MiddlewareModel, Model};
use flowkit_output::{FormatHandler, FormatRegistry};
use flowkit_prompt::{Prompt, PromptBuilder, PromptConfig, TemplateEngine};
use flowkit_tools::{Tool, ToolRegistry};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::sync::Arc;
use tracing::debug;

use crate::driver;
use crate::error::{GenerateError, Result};
use crate::options::GenerateOptions;
use crate::response::GenerateResponse;

/// Name given to prompts built on the fly by [`Registry::generate`].
pub const ADHOC_PROMPT_NAME: &str = "generate";

/// Models, tools, formats, templates and prompts by name.
///
/// # Example
///
/// ```rust
/// use flowkit_generate::{GenerateOptions, Registry};
/// use flowkit_models::MockModel;
///
/// # tokio_test::block_on(async {
/// let mut registry = Registry::new();
/// registry.register_model(MockModel::new("echo").with_text_response("Hi there"))?;
/// registry.set_default_model("echo");
///
/// let response = registry.generate(GenerateOptions::new().prompt("Hello")).await?;
/// assert_eq!(response.text(), "Hi there");
/// # Ok::<(), flowkit_generate::GenerateError>(())
/// # });
/// ```
#[derive(Clone, Default)]
pub struct Registry {
    pub(crate) models: IndexMap<String, BoxedModel>,
    pub(crate) default_model: Option<String>,
    pub(crate) tools: ToolRegistry,
    pub(crate) formats: FormatRegistry,
    pub(crate) templates: TemplateEngine,
    pub(crate) prompts: IndexMap<String, Arc<Prompt>>,
}

impl Registry {
    /// Create an empty registry with the built-in formats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under its own name.
    ///
    /// The model is wrapped with [`ConstrainedGeneration`].
    ///
    /// # Errors
    ///
    /// [`GenerateError::Configuration`] if the name is taken.
    pub fn register_model<M: Model + 'static>(&mut self, model: M) -> Result<&mut Self> {
        self.register_boxed_model(Arc::new(model))
    }

    /// Register a shared model under its own name.
    ///
    /// # Errors
    ///
    /// [`GenerateError::Configuration`] if the name is taken.
    pub fn register_boxed_model(&mut self, model: BoxedModel) -> Result<&mut Self> {
        let name = model.name().to_string();
        if self.models.contains_key(&name) {
            return Err(GenerateError::configuration(format!(
                "model '{name}' is already registered"
            )));
        }
        let wrapped = MiddlewareModel::new(model).with(ConstrainedGeneration::new());
        debug!(model = %name, "Registered model");
        self.models.insert(name, Arc::new(wrapped));
        Ok(self)
    }

    /// Use `name` when neither the call nor the prompt names a model.
    pub fn set_default_model(&mut self, name: impl Into<String>) -> &mut Self {
        self.default_model = Some(name.into());
        self
    }

    /// A registered model, with its middleware.
    pub fn model(&self, name: &str) -> Option<&BoxedModel> {
        self.models.get(name)
    }

    /// Pick the model for a call.
    ///
    /// # Errors
    ///
    /// [`GenerateError::ModelNotFound`] for an unknown name and
    /// [`GenerateError::Configuration`] when no model is named at all.
    pub fn resolve_model(&self, name: Option<&str>) -> Result<BoxedModel> {
        let name = name
            .or(self.default_model.as_deref())
            .ok_or_else(|| GenerateError::configuration("no model specified and no default model set"))?;
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| GenerateError::ModelNotFound(name.to_string()))
    }

    /// Register a tool.
    ///
    /// # Errors
    ///
    /// [`GenerateError::Tool`] if the name is taken.
    pub fn register_tool<T: Tool + 'static>(&mut self, tool: T) -> Result<&mut Self> {
        let name = tool.name();
        self.tools
            .register(tool)
            .map_err(|source| GenerateError::tool(name, source))?;
        Ok(self)
    }

    /// The registered tools.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Register (or replace) an output format.
    pub fn register_format<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(Option<&JsonValue>) -> flowkit_output::Result<FormatHandler> + Send + Sync + 'static,
    {
        self.formats.register(name, constructor);
        self
    }

    /// The output formats.
    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    /// Register a template partial.
    ///
    /// # Errors
    ///
    /// [`GenerateError::Prompt`] if the partial does not parse.
    pub fn register_partial(&mut self, name: impl Into<String>, source: &str) -> Result<&mut Self> {
        self.templates.register_partial(name, source)?;
        Ok(self)
    }

    /// Register a template helper.
    pub fn register_helper<F>(&mut self, name: impl Into<String>, helper: F) -> &mut Self
    where
        F: Fn(&[JsonValue], &JsonMap<String, JsonValue>) -> anyhow::Result<String>
            + Send
            + Sync
            + 'static,
    {
        self.templates.register_helper(name, helper);
        self
    }

    /// The template engine.
    pub fn templates(&self) -> &TemplateEngine {
        &self.templates
    }

    /// Build and register a prompt.
    ///
    /// Output formats are checked against this registry, so custom formats
    /// are accepted.
    ///
    /// # Errors
    ///
    /// [`GenerateError::Prompt`] for an invalid configuration and
    /// [`GenerateError::Configuration`] if the name is taken.
    pub fn define_prompt(&mut self, builder: PromptBuilder) -> Result<Arc<Prompt>> {
        let prompt = Arc::new(builder.build_with(&self.formats)?);
        let name = prompt.name().to_string();
        if self.prompts.contains_key(&name) {
            return Err(GenerateError::configuration(format!(
                "prompt '{name}' is already defined"
            )));
        }
        debug!(prompt = %name, "Defined prompt");
        self.prompts.insert(name, Arc::clone(&prompt));
        Ok(prompt)
    }

    /// A registered prompt.
    pub fn prompt(&self, name: &str) -> Option<Arc<Prompt>> {
        self.prompts.get(name).cloned()
    }

    /// Generate without a predefined prompt.
    ///
    /// The options supply the templates, messages and everything else.
    pub async fn generate(&self, options: GenerateOptions) -> Result<GenerateResponse> {
        let base = PromptConfig {
            name: ADHOC_PROMPT_NAME.to_string(),
            ..PromptConfig::default()
        };
        driver::run(self, &base, JsonValue::Null, options).await
    }

    /// Render and run a registered prompt.
    ///
    /// # Errors
    ///
    /// [`GenerateError::PromptNotFound`] for an unknown name, otherwise as
    /// [`generate_prompt`](Self::generate_prompt).
    pub async fn run_prompt<T: Serialize + ?Sized>(
        &self,
        name: &str,
        input: &T,
        options: GenerateOptions,
    ) -> Result<GenerateResponse> {
        let prompt = self
            .prompt(name)
            .ok_or_else(|| GenerateError::PromptNotFound(name.to_string()))?;
        self.generate_prompt(&prompt, input, options).await
    }

    /// Render and run `prompt` with `input`, applying call-time `options`.
    pub async fn generate_prompt<T: Serialize + ?Sized>(
        &self,
        prompt: &Prompt,
        input: &T,
        options: GenerateOptions,
    ) -> Result<GenerateResponse> {
        let input = serde_json::to_value(input)?;
        driver::run(self, prompt.config(), input, options).await
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .field("default_model", &self.default_model)
            .field("tools", &self.tools)
            .field("formats", &self.formats)
            .field("templates", &self.templates)
            .field("prompts", &self.prompts.keys().collect::<Vec<_>>())
            .finish()
    }
}
