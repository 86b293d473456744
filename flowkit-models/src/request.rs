//! Request and response types exchanged with models.

use chrono::{DateTime, Utc};
use flowkit_core::{GenerationConfig, Message, OutputConfig, ToolRequest};
use flowkit_tools::ToolDefinition;
use serde::{Deserialize, Serialize};

/// Whether and how the model should call tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// Model decides whether to call tools.
    #[default]
    Auto,
    /// Model must call at least one tool.
    Required,
    /// Model should not call any tools.
    None,
}

/// A single request to a model.
///
/// Built fresh for every turn of a generation; the message list only ever
/// grows between turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRequest {
    /// Conversation so far.
    pub messages: Vec<Message>,
    /// Generation parameters.
    #[serde(default, skip_serializing_if = "GenerationConfig::is_empty")]
    pub config: GenerationConfig,
    /// Tools the model may call.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    /// Tool choice strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Expected output.
    #[serde(default)]
    pub output: OutputConfig,
}

impl ModelRequest {
    /// Create a request from messages.
    #[must_use]
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Set the generation config.
    #[must_use]
    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the tools.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Set the tool choice.
    #[must_use]
    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    /// Set the output block.
    #[must_use]
    pub fn with_output(mut self, output: OutputConfig) -> Self {
        self.output = output;
        self
    }
}

/// Why the model stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    /// Natural stop.
    #[default]
    Stop,
    /// Hit the token limit.
    Length,
    /// Blocked by a safety filter.
    Blocked,
    /// Stopped by the caller.
    Interrupted,
    /// Some other reason.
    Other,
    /// Not reported.
    Unknown,
}

/// Token usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Tokens in the prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    /// Tokens generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    /// Total tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl Usage {
    /// Usage with input and output counts.
    #[must_use]
    pub fn with_tokens(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens: Some(input_tokens),
            output_tokens: Some(output_tokens),
            total_tokens: Some(input_tokens + output_tokens),
        }
    }

    /// Add another usage record into this one.
    pub fn merge(&mut self, other: &Usage) {
        fn add(a: Option<u64>, b: Option<u64>) -> Option<u64> {
            match (a, b) {
                (Some(a), Some(b)) => Some(a + b),
                (a, b) => a.or(b),
            }
        }
        self.input_tokens = add(self.input_tokens, other.input_tokens);
        self.output_tokens = add(self.output_tokens, other.output_tokens);
        self.total_tokens = add(self.total_tokens, other.total_tokens);
    }
}

impl std::ops::AddAssign<&Usage> for Usage {
    fn add_assign(&mut self, rhs: &Usage) {
        self.merge(rhs);
    }
}

/// A model's answer to one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelResponse {
    /// The generated message.
    pub message: Message,
    /// Why generation stopped.
    #[serde(default)]
    pub finish_reason: FinishReason,
    /// Provider detail on the finish reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_message: Option<String>,
    /// Token usage.
    #[serde(default)]
    pub usage: Usage,
    /// Time the request took.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// When the response was produced.
    pub timestamp: DateTime<Utc>,
    /// The request as actually sent, after middleware.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Box<ModelRequest>>,
}

impl ModelResponse {
    /// Create a response carrying `message`.
    #[must_use]
    pub fn new(message: Message) -> Self {
        Self {
            message,
            finish_reason: FinishReason::Stop,
            finish_message: None,
            usage: Usage::default(),
            latency_ms: None,
            timestamp: Utc::now(),
            request: None,
        }
    }

    /// Create a text response.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Message::model(text))
    }

    /// Set the finish reason.
    #[must_use]
    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = reason;
        self
    }

    /// Set usage.
    #[must_use]
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    /// Concatenated text of the message.
    pub fn text_content(&self) -> String {
        self.message.text()
    }

    /// Tool requests in the message, in order.
    pub fn tool_requests(&self) -> Vec<&ToolRequest> {
        self.message.tool_requests()
    }

    /// Whether the message requests any tool.
    pub fn has_tool_requests(&self) -> bool {
        self.message.has_tool_requests()
    }
}
