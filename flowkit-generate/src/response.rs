//! The result of a generation.

use flowkit_core::{Message, ToolRequest};
use flowkit_models::{FinishReason, ModelRequest, Usage};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::Result;

/// The final response of a generation, with its trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    /// The final model message, normalized by the output format.
    pub message: Message,
    /// Why the last model call stopped.
    pub finish_reason: FinishReason,
    /// Provider detail on the finish reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_message: Option<String>,
    /// Token usage summed over every turn.
    #[serde(default)]
    pub usage: Usage,
    /// The last request sent to the model.
    pub request: ModelRequest,
    /// Every message of the conversation, ending with `message`.
    pub history: Vec<Message>,
    /// The parsed output, absent when tool requests were returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<JsonValue>,
    /// Wall-clock time of the whole generation.
    pub latency_ms: u64,
    /// Model invocations made.
    pub turns: usize,
}

impl GenerateResponse {
    /// Text of the final message's text and JSON parts.
    pub fn text(&self) -> String {
        self.message
            .content
            .iter()
            .filter_map(|p| p.as_text().or_else(|| p.as_json()))
            .collect()
    }

    /// The parsed output.
    pub fn output(&self) -> Option<&JsonValue> {
        self.output.as_ref()
    }

    /// Deserialize the parsed output.
    ///
    /// Without parsed output the final text is deserialized as a string.
    pub fn output_as<T: DeserializeOwned>(&self) -> Result<T> {
        let value = match &self.output {
            Some(value) => value.clone(),
            None => JsonValue::String(self.text()),
        };
        Ok(serde_json::from_value(value)?)
    }

    /// Tool requests in the final message.
    pub fn tool_requests(&self) -> Vec<&ToolRequest> {
        self.message.tool_requests()
    }

    /// Whether the final message requests tools.
    pub fn has_tool_requests(&self) -> bool {
        self.message.has_tool_requests()
    }

    /// The full conversation.
    pub fn messages(&self) -> &[Message] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowkit_core::{Part, Role};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn response(message: Message, output: Option<JsonValue>) -> GenerateResponse {
        GenerateResponse {
            history: vec![Message::user("hi"), message.clone()],
            message,
            finish_reason: FinishReason::Stop,
            finish_message: None,
            usage: Usage::default(),
            request: ModelRequest::new(vec![Message::user("hi")]),
            output,
            latency_ms: 0,
            turns: 1,
        }
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct City {
        name: String,
    }

    #[test]
    fn test_text_includes_json_parts() {
        let message = Message::new(
            Role::Model,
            vec![Part::text("a "), Part::json(r#"{"name":"Oslo"}"#)],
        );
        assert_eq!(response(message, None).text(), r#"a {"name":"Oslo"}"#);
    }

    #[test]
    fn test_output_as() {
        let res = response(Message::model("ignored"), Some(json!({"name": "Oslo"})));
        assert_eq!(res.output_as::<City>().unwrap(), City { name: "Oslo".into() });

        let res = response(Message::model("plain"), None);
        assert_eq!(res.output_as::<String>().unwrap(), "plain");
        assert!(res.output_as::<City>().is_err());
        assert_eq!(res.messages().len(), 2);
    }
}
