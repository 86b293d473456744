//! Call-time options for a generation.

use flowkit_core::{GenerationConfig, Message, ModelResponseChunk};
use flowkit_models::ToolChoice;
use flowkit_prompt::PromptConfig;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One streamed chunk as seen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateChunk {
    /// The raw chunk. Its `index` is the position the finished message will
    /// take in the conversation.
    pub chunk: ModelResponseChunk,
    /// The output parsed so far by the active format, if any.
    pub output: Option<JsonValue>,
}

impl GenerateChunk {
    /// Text carried by the chunk.
    pub fn text(&self) -> String {
        self.chunk.text_content()
    }
}

/// Receives streamed chunks. An error aborts the generation.
pub type StreamCallback = Arc<dyn Fn(GenerateChunk) -> anyhow::Result<()> + Send + Sync>;

/// Options for a single generation call.
///
/// Every field is optional. Set fields override what the prompt defines;
/// `config` is merged field by field and `messages` are appended after the
/// prompt's own messages.
#[derive(Clone, Default)]
pub struct GenerateOptions {
    /// Model name.
    pub model: Option<String>,
    /// System message template.
    pub system: Option<String>,
    /// User message template.
    pub prompt: Option<String>,
    /// Conversation messages.
    pub messages: Vec<Message>,
    /// Generation parameters.
    pub config: GenerationConfig,
    /// Tool names, replacing the prompt's list.
    pub tools: Option<Vec<String>>,
    /// Tool choice.
    pub tool_choice: Option<ToolChoice>,
    /// Model invocations allowed.
    pub max_turns: Option<usize>,
    /// Return tool requests instead of running them.
    pub return_tool_requests: Option<bool>,
    /// Output format name.
    pub output_format: Option<String>,
    /// Output JSON Schema.
    pub output_schema: Option<JsonValue>,
    /// Instructions replacing the format's own.
    pub output_instructions: Option<String>,
    /// Streaming callback.
    pub stream: Option<StreamCallback>,
    /// Cancellation signal.
    pub cancellation: Option<CancellationToken>,
}

impl GenerateOptions {
    /// Empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the system message template.
    #[must_use]
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the user message template.
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Set the conversation messages.
    #[must_use]
    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    /// Append one conversation message.
    #[must_use]
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Set generation parameters.
    #[must_use]
    pub fn config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the tools.
    #[must_use]
    pub fn tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Set the tool choice.
    #[must_use]
    pub fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    /// Set the turn limit.
    #[must_use]
    pub fn max_turns(mut self, turns: usize) -> Self {
        self.max_turns = Some(turns);
        self
    }

    /// Return tool requests to the caller.
    #[must_use]
    pub fn return_tool_requests(mut self, enabled: bool) -> Self {
        self.return_tool_requests = Some(enabled);
        self
    }

    /// Set the output format.
    #[must_use]
    pub fn output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = Some(format.into());
        self
    }

    /// Set the output schema.
    #[must_use]
    pub fn output_schema(mut self, schema: JsonValue) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Set explicit output instructions.
    #[must_use]
    pub fn output_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.output_instructions = Some(instructions.into());
        self
    }

    /// Stream chunks to `callback`.
    #[must_use]
    pub fn stream<F>(mut self, callback: F) -> Self
    where
        F: Fn(GenerateChunk) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.stream = Some(Arc::new(callback));
        self
    }

    /// Observe `token` for cancellation.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Apply these options on top of a prompt's configuration.
    ///
    /// A call-time system or prompt template also clears the prompt's
    /// function for that slot. `messages`, `stream` and `cancellation` are
    /// not part of the result; the driver uses them directly.
    pub fn merged_over(&self, base: &PromptConfig) -> PromptConfig {
        let mut merged = base.clone();
        if let Some(model) = &self.model {
            merged.model = Some(model.clone());
        }
        if let Some(system) = &self.system {
            merged.system_text = Some(system.clone());
            merged.system_fn = None;
        }
        if let Some(prompt) = &self.prompt {
            merged.prompt_text = Some(prompt.clone());
            merged.prompt_fn = None;
        }
        merged.config = base.config.merge(&self.config);
        if let Some(tools) = &self.tools {
            merged.tools = tools.clone();
        }
        if self.tool_choice.is_some() {
            merged.tool_choice = self.tool_choice;
        }
        if self.max_turns.is_some() {
            merged.max_turns = self.max_turns;
        }
        if self.return_tool_requests.is_some() {
            merged.return_tool_requests = self.return_tool_requests;
        }
        if let Some(format) = &self.output_format {
            merged.output_format = Some(format.clone());
        }
        if let Some(schema) = &self.output_schema {
            merged.output_schema = Some(schema.clone());
        }
        if let Some(instructions) = &self.output_instructions {
            merged.output_instructions = Some(instructions.clone());
        }
        merged
    }
}

impl fmt::Debug for GenerateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerateOptions")
            .field("model", &self.model)
            .field("system", &self.system)
            .field("prompt", &self.prompt)
            .field("messages", &self.messages.len())
            .field("config", &self.config)
            .field("tools", &self.tools)
            .field("tool_choice", &self.tool_choice)
            .field("max_turns", &self.max_turns)
            .field("return_tool_requests", &self.return_tool_requests)
            .field("output_format", &self.output_format)
            .field("output_schema", &self.output_schema.is_some())
            .field("stream", &self.stream.is_some())
            .field("cancellation", &self.cancellation.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn base() -> PromptConfig {
        PromptConfig {
            name: "summarize".into(),
            model: Some("slow".into()),
            prompt_fn: Some(Arc::new(|_| Ok("from fn".to_string()))),
            tools: vec!["search".into()],
            config: GenerationConfig::new().temperature(0.2).max_output_tokens(100),
            max_turns: Some(2),
            output_format: Some("json".into()),
            ..PromptConfig::default()
        }
    }

    #[test]
    fn test_unset_options_keep_prompt_values() {
        let merged = GenerateOptions::new().merged_over(&base());
        assert_eq!(merged.model.as_deref(), Some("slow"));
        assert_eq!(merged.tools, vec!["search".to_string()]);
        assert_eq!(merged.max_turns, Some(2));
        assert!(merged.prompt_fn.is_some());
        assert_eq!(merged.config, base().config);
    }

    #[test]
    fn test_call_time_values_win() {
        let options = GenerateOptions::new()
            .model("fast")
            .prompt("Summarize {{text}}")
            .tools(["lookup", "search"])
            .max_turns(5)
            .return_tool_requests(true)
            .output_schema(json!({"type": "object"}))
            .config(GenerationConfig::new().temperature(0.9));
        let merged = options.merged_over(&base());

        assert_eq!(merged.model.as_deref(), Some("fast"));
        assert_eq!(merged.prompt_text.as_deref(), Some("Summarize {{text}}"));
        assert!(merged.prompt_fn.is_none());
        assert_eq!(merged.tools, vec!["lookup".to_string(), "search".to_string()]);
        assert_eq!(merged.max_turns, Some(5));
        assert_eq!(merged.return_tool_requests, Some(true));
        assert_eq!(merged.output_format.as_deref(), Some("json"));
        assert_eq!(merged.output_schema, Some(json!({"type": "object"})));
        assert_eq!(merged.config.temperature, Some(0.9));
        assert_eq!(merged.config.max_output_tokens, Some(100));
    }

    #[test]
    fn test_debug_hides_callbacks() {
        let options = GenerateOptions::new().stream(|_| Ok(()));
        let debug = format!("{options:?}");
        assert!(debug.contains("stream: true"));
    }
}
