//! Validated prompts and rendering.

use flowkit_core::{GenerationConfig, Message, OutputConfig, PartKind, Role};
use flowkit_models::{ModelRequest, ToolChoice};
use flowkit_output::{resolve_instructions, FormatRegistry};
use flowkit_tools::ToolDefinition;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::config::{PromptBuilder, PromptConfig, TextFn};
use crate::error::{PromptError, Result};
use crate::input::{merge_defaults, value_to_variables};
use crate::template::{assemble_messages, Segment, Template, TemplateEngine};

/// A prompt whose configuration has been validated.
#[derive(Debug, Clone)]
pub struct Prompt {
    config: PromptConfig,
    system: Option<Template>,
    prompt: Option<Template>,
}

/// The request-shaped result of rendering a prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    /// Rendered messages in order.
    pub messages: Vec<Message>,
    /// Model name from the prompt.
    pub model: Option<String>,
    /// Generation parameters.
    pub config: GenerationConfig,
    /// Tool names the model may call.
    pub tools: Vec<String>,
    /// Tool choice.
    pub tool_choice: Option<ToolChoice>,
    /// Resolved output configuration.
    pub output: OutputConfig,
    /// Resolved output instructions, if the format has any.
    pub output_instructions: Option<String>,
    /// Turn limit from the prompt.
    pub max_turns: Option<usize>,
    /// Whether tool requests are returned instead of run.
    pub return_tool_requests: Option<bool>,
}

impl RenderedPrompt {
    /// Build a model request, given the definitions of the named tools.
    pub fn to_request(&self, tools: Vec<ToolDefinition>) -> ModelRequest {
        let mut request = ModelRequest::new(self.messages.clone())
            .with_config(self.config.clone())
            .with_tools(tools)
            .with_output(self.output.clone());
        if let Some(choice) = self.tool_choice {
            request = request.with_tool_choice(choice);
        }
        request
    }
}

impl Prompt {
    /// Start building a prompt.
    pub fn builder(name: impl Into<String>) -> PromptBuilder {
        PromptBuilder::new(name)
    }

    /// Validate `config` against `formats` and build a prompt from it.
    ///
    /// # Errors
    ///
    /// [`PromptError::Configuration`] listing every conflict found.
    pub fn with_config(config: PromptConfig, formats: &FormatRegistry) -> Result<Self> {
        let conflicts = config.validate(formats);
        if !conflicts.is_empty() {
            return Err(PromptError::Configuration(conflicts));
        }
        Self::from_config(config)
    }

    pub(crate) fn from_config(config: PromptConfig) -> Result<Self> {
        let system = config.system_text.as_deref().map(Template::parse).transpose()?;
        let prompt = config.prompt_text.as_deref().map(Template::parse).transpose()?;
        Ok(Self {
            config,
            system,
            prompt,
        })
    }

    /// Prompt name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The prompt's configuration.
    pub fn config(&self) -> &PromptConfig {
        &self.config
    }

    /// Render with serializable input.
    ///
    /// `history` holds call-time messages; they follow the prompt's own
    /// messages and are not treated as templates.
    pub fn render<T: Serialize + ?Sized>(
        &self,
        engine: &TemplateEngine,
        formats: &FormatRegistry,
        input: &T,
        history: &[Message],
    ) -> Result<RenderedPrompt> {
        let input = serde_json::to_value(input).map_err(|e| PromptError::Input(e.to_string()))?;
        self.render_value(engine, formats, input, history)
    }

    /// Render with already serialized input.
    ///
    /// The system message comes first, then the prompt's messages and
    /// `history`, then the user message. A `{{history}}` marker in either
    /// template places the messages there instead; only the first marker
    /// receives them.
    pub fn render_value(
        &self,
        engine: &TemplateEngine,
        formats: &FormatRegistry,
        input: JsonValue,
        history: &[Message],
    ) -> Result<RenderedPrompt> {
        let vars = merge_defaults(value_to_variables(input.clone())?, self.config.default_input.as_ref());
        let data = JsonValue::Object(vars);

        let mut between = self.prompt_messages(engine, &input, &data)?;
        between.extend_from_slice(history);

        let system = self
            .render_part(engine, self.system.as_ref(), self.config.system_fn.as_ref(), "system", &input, &data)?
            .map(|segments| assemble_messages(segments, Role::System, &between));
        let unplaced: &[Message] = match &system {
            Some(system) if system.used_history => &[],
            _ => &between,
        };
        let user = self
            .render_part(engine, self.prompt.as_ref(), self.config.prompt_fn.as_ref(), "prompt", &input, &data)?
            .map(|segments| assemble_messages(segments, Role::User, unplaced));

        let placed = system.iter().chain(user.iter()).any(|a| a.used_history);
        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.extend(system.messages);
        }
        if !placed {
            messages.extend(between);
        }
        if let Some(user) = user {
            messages.extend(user.messages);
        }

        let handler = formats.resolve(
            self.config.output_schema.as_ref(),
            self.config.output_format.as_deref(),
        )?;
        let output_instructions =
            resolve_instructions(&handler, self.config.output_instructions.as_deref());
        debug!(
            prompt = %self.config.name,
            message_count = messages.len(),
            format = handler.name(),
            "Rendered prompt"
        );

        Ok(RenderedPrompt {
            messages,
            model: self.config.model.clone(),
            config: self.config.config.clone(),
            tools: self.config.tools.clone(),
            tool_choice: self.config.tool_choice,
            output: handler.config(),
            output_instructions,
            max_turns: self.config.max_turns,
            return_tool_requests: self.config.return_tool_requests,
        })
    }

    fn render_part(
        &self,
        engine: &TemplateEngine,
        template: Option<&Template>,
        function: Option<&TextFn>,
        field: &'static str,
        input: &JsonValue,
        data: &JsonValue,
    ) -> Result<Option<Vec<Segment>>> {
        if let Some(template) = template {
            return engine.render(template, data).map(Some);
        }
        let Some(function) = function else {
            return Ok(None);
        };
        let source = function(input).map_err(|source| PromptError::Function { field, source })?;
        engine.render_str(&source, data).map(Some)
    }

    fn prompt_messages(
        &self,
        engine: &TemplateEngine,
        input: &JsonValue,
        data: &JsonValue,
    ) -> Result<Vec<Message>> {
        let messages = match (&self.config.messages, &self.config.messages_fn) {
            (Some(messages), _) => messages.clone(),
            (None, Some(function)) => function(input).map_err(|source| PromptError::Function {
                field: "messages",
                source,
            })?,
            (None, None) => return Ok(Vec::new()),
        };
        messages
            .iter()
            .map(|message| render_message(engine, message, data))
            .collect()
    }
}

/// Render the text parts of a message as templates. Media markers become
/// media parts after the text they appeared in.
fn render_message(engine: &TemplateEngine, message: &Message, data: &JsonValue) -> Result<Message> {
    let mut content = Vec::with_capacity(message.content.len());
    for part in &message.content {
        let Some(source) = part.as_text() else {
            content.push(part.clone());
            continue;
        };
        let mut text = String::new();
        let mut media = Vec::new();
        for segment in engine.render_str(source, data)? {
            match segment {
                Segment::Text(t) => text.push_str(&t),
                Segment::Media { url, content_type } => {
                    media.push(flowkit_core::Part::media(url, content_type));
                }
                Segment::Role(_) | Segment::History | Segment::Section(_) => {}
            }
        }
        let mut rendered = part.clone();
        if let PartKind::Text { text: slot, .. } = &mut rendered.kind {
            *slot = text;
        }
        content.push(rendered);
        content.extend(media);
    }
    Ok(Message {
        content,
        ..message.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowkit_core::Part;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn render(prompt: &Prompt, input: JsonValue, history: &[Message]) -> RenderedPrompt {
        prompt
            .render_value(&TemplateEngine::new(), &FormatRegistry::default(), input, history)
            .unwrap()
    }

    #[test]
    fn test_order_is_system_messages_user() {
        let prompt = Prompt::builder("chat")
            .system("You are {{persona}}.")
            .message(Message::user("My name is {{name}}."))
            .message(Message::model("Nice to meet you."))
            .prompt("What is my name?")
            .default_input(&json!({"persona": "a helpful bot"}))
            .build()
            .unwrap();
        let rendered = render(&prompt, json!({"name": "Ada"}), &[Message::user("call-time")]);
        assert_eq!(
            rendered.messages,
            vec![
                Message::system("You are a helpful bot."),
                Message::user("My name is Ada."),
                Message::model("Nice to meet you."),
                Message::user("call-time"),
                Message::user("What is my name?"),
            ]
        );
    }

    #[test]
    fn test_caller_input_overrides_defaults() {
        let prompt = Prompt::builder("p")
            .prompt("{{greeting}}, {{name}}")
            .default_input(&json!({"greeting": "Hello", "name": "stranger"}))
            .build()
            .unwrap();
        let rendered = render(&prompt, json!({"name": "Ada"}), &[]);
        assert_eq!(rendered.messages, vec![Message::user("Hello, Ada")]);
    }

    #[test]
    fn test_history_marker_places_history() {
        let prompt = Prompt::builder("p")
            .prompt("{{role \"system\"}}Stay on topic.{{history}}{{role \"user\"}}{{question}}")
            .build()
            .unwrap();
        let history = vec![Message::user("earlier"), Message::model("answer")];
        let rendered = render(&prompt, json!({"question": "And now?"}), &history);
        let roles: Vec<_> = rendered.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Model, Role::User]);
        assert_eq!(rendered.messages[3].text(), "And now?");
    }

    #[test]
    fn test_history_goes_to_first_marker_only() {
        let prompt = Prompt::builder("p")
            .system("Rules.{{history}}")
            .prompt("Question.{{history}}")
            .build()
            .unwrap();
        let rendered = render(&prompt, json!({}), &[Message::user("earlier")]);
        let texts: Vec<_> = rendered.messages.iter().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["Rules.", "earlier", "Question."]);
        assert_eq!(rendered.messages[1].role, Role::User);
    }

    #[test]
    fn test_functions_are_rendered_as_templates() {
        let prompt = Prompt::builder("p")
            .system_fn(|input| {
                let lang = input["lang"].as_str().unwrap_or("en");
                Ok(format!("Answer in {lang}. Be {{{{tone}}}}."))
            })
            .messages_fn(|_| Ok(vec![Message::user("Context: {{topic}}")]))
            .prompt_fn(|_| Ok("Go.".to_string()))
            .default_input(&json!({"tone": "brief"}))
            .build()
            .unwrap();
        let rendered = render(&prompt, json!({"lang": "fr", "topic": "bees"}), &[]);
        assert_eq!(
            rendered.messages,
            vec![
                Message::system("Answer in fr. Be brief."),
                Message::user("Context: bees"),
                Message::user("Go."),
            ]
        );
    }

    #[test]
    fn test_function_failure_names_the_field() {
        let prompt = Prompt::builder("p")
            .prompt_fn(|_| Err(anyhow::anyhow!("no data")))
            .build()
            .unwrap();
        let err = prompt
            .render_value(&TemplateEngine::new(), &FormatRegistry::default(), json!({}), &[])
            .unwrap_err();
        assert_eq!(err.to_string(), "prompt function failed: no data");
    }

    #[test]
    fn test_output_block_is_resolved() {
        let schema = json!({"type": "object", "properties": {"title": {"type": "string"}}});
        let prompt = Prompt::builder("p")
            .prompt("Name a book.")
            .output_schema(schema.clone())
            .tool("library")
            .max_turns(2)
            .build()
            .unwrap();
        let rendered = render(&prompt, JsonValue::Null, &[]);
        assert_eq!(rendered.output.format.as_deref(), Some("json"));
        assert_eq!(rendered.output.schema, Some(schema));
        assert!(rendered
            .output_instructions
            .as_deref()
            .is_some_and(|i| i.starts_with("Output should be in JSON format")));
        assert_eq!(rendered.tools, vec!["library".to_string()]);

        let request = rendered.to_request(vec![ToolDefinition::new("library", "Find books")]);
        assert_eq!(request.tools.len(), 1);
        assert_eq!(request.messages, vec![Message::user("Name a book.")]);
    }

    #[test]
    fn test_explicit_instructions_win() {
        let prompt = Prompt::builder("p")
            .prompt("Pick one.")
            .output_format("enum")
            .output_schema(json!({"enum": ["a", "b"]}))
            .output_instructions("Just the letter.")
            .build()
            .unwrap();
        let rendered = render(&prompt, json!({}), &[]);
        assert_eq!(rendered.output_instructions.as_deref(), Some("Just the letter."));
    }

    #[test]
    fn test_message_media_marker_becomes_part() {
        let prompt = Prompt::builder("p")
            .message(Message::user("See {{media url=photo}}"))
            .build()
            .unwrap();
        let rendered = render(&prompt, json!({"photo": "https://example.com/a.png"}), &[]);
        assert_eq!(
            rendered.messages[0].content,
            vec![Part::text("See "), Part::media("https://example.com/a.png", None)]
        );
    }

    #[test]
    fn test_with_config_validates() {
        let config = PromptConfig {
            name: "p".into(),
            prompt_text: Some("{{#each xs}}".into()),
            ..PromptConfig::default()
        };
        let err = Prompt::with_config(config, &FormatRegistry::default()).unwrap_err();
        assert_eq!(err.conflicts()[0].field, "promptText");
    }

    #[test]
    fn test_non_object_input_is_rejected() {
        let prompt = Prompt::builder("p").prompt("x").build().unwrap();
        let err = prompt
            .render(&TemplateEngine::new(), &FormatRegistry::default(), &[1, 2], &[])
            .unwrap_err();
        assert!(matches!(err, PromptError::Input(_)));
    }
}
