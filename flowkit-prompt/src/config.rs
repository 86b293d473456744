//! Prompt configuration and its builder.
//!
//! A [`PromptConfig`] is plain data. [`PromptBuilder`] fills one in through
//! fluent setters and validates it once in [`PromptBuilder::build`], which
//! reports every problem found rather than stopping at the first.

use flowkit_core::{GenerationConfig, Message};
use flowkit_models::ToolChoice;
use flowkit_output::FormatRegistry;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{ConfigConflict, PromptError, Result};
use crate::input::{to_variables, Variables};
use crate::prompt::Prompt;
use crate::template::Template;

/// Produces template source from the raw prompt input.
pub type TextFn = Arc<dyn Fn(&JsonValue) -> anyhow::Result<String> + Send + Sync>;

/// Produces messages from the raw prompt input.
pub type MessagesFn = Arc<dyn Fn(&JsonValue) -> anyhow::Result<Vec<Message>> + Send + Sync>;

/// Everything a prompt defines ahead of a call.
#[derive(Clone, Default)]
pub struct PromptConfig {
    /// Prompt name.
    pub name: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Name of the model to use.
    pub model: Option<String>,
    /// System message template.
    pub system_text: Option<String>,
    /// Function producing the system message template.
    pub system_fn: Option<TextFn>,
    /// User message template.
    pub prompt_text: Option<String>,
    /// Function producing the user message template.
    pub prompt_fn: Option<TextFn>,
    /// Messages placed between the system and user messages.
    pub messages: Option<Vec<Message>>,
    /// Function producing those messages.
    pub messages_fn: Option<MessagesFn>,
    /// Names of tools the model may call.
    pub tools: Vec<String>,
    /// Generation parameters.
    pub config: GenerationConfig,
    /// Tool choice.
    pub tool_choice: Option<ToolChoice>,
    /// Model invocations allowed per generation.
    pub max_turns: Option<usize>,
    /// Return tool requests to the caller instead of running them.
    pub return_tool_requests: Option<bool>,
    /// Output format name.
    pub output_format: Option<String>,
    /// Output JSON Schema.
    pub output_schema: Option<JsonValue>,
    /// Instructions that replace the format's own.
    pub output_instructions: Option<String>,
    /// Input values used when the caller does not supply them.
    pub default_input: Option<Variables>,
}

impl PromptConfig {
    /// Check the configuration, returning every conflict found.
    pub fn validate(&self, formats: &FormatRegistry) -> Vec<ConfigConflict> {
        let mut conflicts = Vec::new();

        if self.name.trim().is_empty() {
            conflicts.push(ConfigConflict::new("name", "prompt name must not be empty"));
        }

        let exclusive = [
            ("system", self.system_text.is_some(), self.system_fn.is_some(), "systemText", "systemFn"),
            ("prompt", self.prompt_text.is_some(), self.prompt_fn.is_some(), "promptText", "promptFn"),
            ("messages", self.messages.is_some(), self.messages_fn.is_some(), "messages", "messagesFn"),
        ];
        for (field, a, b, a_name, b_name) in exclusive {
            if a && b {
                conflicts.push(ConfigConflict::new(
                    field,
                    format!("{a_name} and {b_name} are mutually exclusive"),
                ));
            }
        }

        for (field, source) in [("systemText", &self.system_text), ("promptText", &self.prompt_text)] {
            if let Some(source) = source {
                if let Err(e) = Template::parse(source.as_str()) {
                    conflicts.push(ConfigConflict::new(field, e.to_string()));
                }
            }
        }

        if self.max_turns == Some(0) {
            conflicts.push(ConfigConflict::new("maxTurns", "must be at least 1"));
        }

        let mut seen = HashSet::new();
        for tool in &self.tools {
            if !seen.insert(tool.as_str()) {
                conflicts.push(ConfigConflict::new(
                    "tools",
                    format!("tool '{tool}' is listed more than once"),
                ));
            }
        }

        if let Err(e) = formats.resolve(self.output_schema.as_ref(), self.output_format.as_deref()) {
            conflicts.push(ConfigConflict::new("output", e.to_string()));
        }

        conflicts
    }
}

impl fmt::Debug for PromptConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptConfig")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("system_text", &self.system_text)
            .field("system_fn", &self.system_fn.is_some())
            .field("prompt_text", &self.prompt_text)
            .field("prompt_fn", &self.prompt_fn.is_some())
            .field("messages", &self.messages.as_ref().map(Vec::len))
            .field("messages_fn", &self.messages_fn.is_some())
            .field("tools", &self.tools)
            .field("max_turns", &self.max_turns)
            .field("output_format", &self.output_format)
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`Prompt`]s.
#[derive(Debug, Default)]
pub struct PromptBuilder {
    config: PromptConfig,
    conflicts: Vec<ConfigConflict>,
}

impl PromptBuilder {
    /// Start a prompt with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            config: PromptConfig {
                name: name.into(),
                ..PromptConfig::default()
            },
            conflicts: Vec::new(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.config.description = Some(description.into());
        self
    }

    /// Set the model name.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    /// Set the system message template.
    #[must_use]
    pub fn system(mut self, template: impl Into<String>) -> Self {
        self.config.system_text = Some(template.into());
        self
    }

    /// Set a function producing the system message template.
    #[must_use]
    pub fn system_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&JsonValue) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        self.config.system_fn = Some(Arc::new(f));
        self
    }

    /// Set the user message template.
    #[must_use]
    pub fn prompt(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_text = Some(template.into());
        self
    }

    /// Set a function producing the user message template.
    #[must_use]
    pub fn prompt_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&JsonValue) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        self.config.prompt_fn = Some(Arc::new(f));
        self
    }

    /// Set the messages placed between system and user message.
    #[must_use]
    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.config.messages = Some(messages);
        self
    }

    /// Append one message.
    #[must_use]
    pub fn message(mut self, message: Message) -> Self {
        self.config.messages.get_or_insert_with(Vec::new).push(message);
        self
    }

    /// Set a function producing the messages.
    #[must_use]
    pub fn messages_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&JsonValue) -> anyhow::Result<Vec<Message>> + Send + Sync + 'static,
    {
        self.config.messages_fn = Some(Arc::new(f));
        self
    }

    /// Allow a tool by name.
    #[must_use]
    pub fn tool(mut self, name: impl Into<String>) -> Self {
        self.config.tools.push(name.into());
        self
    }

    /// Allow several tools by name.
    #[must_use]
    pub fn tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.tools.extend(names.into_iter().map(Into::into));
        self
    }

    /// Set generation parameters.
    #[must_use]
    pub fn config(mut self, config: GenerationConfig) -> Self {
        self.config.config = config;
        self
    }

    /// Set the tool choice.
    #[must_use]
    pub fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.config.tool_choice = Some(choice);
        self
    }

    /// Set the turn limit.
    #[must_use]
    pub fn max_turns(mut self, turns: usize) -> Self {
        self.config.max_turns = Some(turns);
        self
    }

    /// Return tool requests instead of running them.
    #[must_use]
    pub fn return_tool_requests(mut self, enabled: bool) -> Self {
        self.config.return_tool_requests = Some(enabled);
        self
    }

    /// Set the output format name.
    #[must_use]
    pub fn output_format(mut self, format: impl Into<String>) -> Self {
        self.config.output_format = Some(format.into());
        self
    }

    /// Set the output JSON Schema.
    #[must_use]
    pub fn output_schema(mut self, schema: JsonValue) -> Self {
        self.config.output_schema = Some(schema);
        self
    }

    /// Replace the format's output instructions.
    #[must_use]
    pub fn output_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.config.output_instructions = Some(instructions.into());
        self
    }

    /// Set default input values. Caller input takes precedence.
    #[must_use]
    pub fn default_input<T: Serialize + ?Sized>(mut self, input: &T) -> Self {
        match to_variables(input) {
            Ok(vars) => self.config.default_input = Some(vars),
            Err(e) => self
                .conflicts
                .push(ConfigConflict::new("defaultInput", e.to_string())),
        }
        self
    }

    /// Validate against the built-in formats and build the prompt.
    pub fn build(self) -> Result<Prompt> {
        self.build_with(&FormatRegistry::default())
    }

    /// Validate against `formats` and build the prompt.
    ///
    /// # Errors
    ///
    /// [`PromptError::Configuration`] listing every conflict found.
    pub fn build_with(self, formats: &FormatRegistry) -> Result<Prompt> {
        let mut conflicts = self.conflicts;
        conflicts.extend(self.config.validate(formats));
        if !conflicts.is_empty() {
            return Err(PromptError::Configuration(conflicts));
        }
        Prompt::from_config(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowkit_output::{FormatHandler, TextFormat};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fields(err: &PromptError) -> Vec<&str> {
        err.conflicts().iter().map(|c| c.field.as_str()).collect()
    }

    #[test]
    fn test_prompt_text_and_fn_conflict_at_build() {
        let err = PromptBuilder::new("greet")
            .prompt("Hello {{name}}")
            .prompt_fn(|_| Ok("Hi".to_string()))
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(fields(&err), vec!["prompt"]);
        assert!(err.to_string().contains("promptText and promptFn are mutually exclusive"));
    }

    #[test]
    fn test_all_conflicts_are_collected() {
        let err = PromptBuilder::new("everything-wrong")
            .system("a")
            .system_fn(|_| Ok(String::new()))
            .messages(vec![Message::user("x")])
            .messages_fn(|_| Ok(vec![]))
            .prompt("{{#if open}}never closed")
            .max_turns(0)
            .tools(["search", "search"])
            .output_format("jsonl")
            .output_schema(json!({"type": "object"}))
            .default_input(&42)
            .build()
            .unwrap_err();
        assert_eq!(
            fields(&err),
            vec!["defaultInput", "system", "messages", "promptText", "maxTurns", "tools", "output"]
        );
    }

    #[test]
    fn test_unknown_format_is_a_conflict() {
        let err = PromptBuilder::new("p")
            .prompt("hi")
            .output_format("bogus")
            .build()
            .unwrap_err();
        assert_eq!(fields(&err), vec!["output"]);
    }

    #[test]
    fn test_custom_format_registry() {
        let mut formats = FormatRegistry::default();
        formats.register("bogus", |_| Ok(FormatHandler::Text(TextFormat::new())));
        let prompt = PromptBuilder::new("p")
            .prompt("hi")
            .output_format("bogus")
            .build_with(&formats)
            .unwrap();
        assert_eq!(prompt.config().output_format.as_deref(), Some("bogus"));
    }

    #[test]
    fn test_valid_prompt_builds() {
        let prompt = PromptBuilder::new("summarize")
            .model("mock")
            .system("You summarize.")
            .prompt("Summarize: {{text}}")
            .tool("lookup")
            .max_turns(3)
            .output_schema(json!({"type": "object"}))
            .default_input(&json!({"text": "nothing"}))
            .build()
            .unwrap();
        assert_eq!(prompt.name(), "summarize");
        assert_eq!(prompt.config().max_turns, Some(3));
        assert!(prompt.config().default_input.is_some());
    }
}
