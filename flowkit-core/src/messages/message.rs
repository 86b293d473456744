//! Messages and roles.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

use super::parts::{Metadata, Part, ToolRequest};
use crate::errors::CoreError;

/// The author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// End-user input.
    User,
    /// Model output.
    Model,
    /// Tool results fed back to the model.
    Tool,
}

impl Role {
    /// The lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Model => "model",
            Role::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "model" | "assistant" => Ok(Role::Model),
            "tool" => Ok(Role::Tool),
            _ => Err(CoreError::UnknownRole(s.to_string())),
        }
    }
}

/// A single message in a conversation.
///
/// Messages are treated as immutable values: the `with_*` helpers return
/// modified copies and leave the receiver untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who authored the message.
    pub role: Role,
    /// Ordered content parts.
    pub content: Vec<Part>,
    /// Optional metadata.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<Metadata>,
}

impl Message {
    /// Create a message from a role and parts.
    pub fn new(role: Role, content: Vec<Part>) -> Self {
        Self {
            role,
            content,
            metadata: None,
        }
    }

    /// Create a system message with a single text part.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![Part::text(text)])
    }

    /// Create a user message with a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    /// Create a model message with a single text part.
    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, vec![Part::text(text)])
    }

    /// Create a tool message from parts.
    pub fn tool(content: Vec<Part>) -> Self {
        Self::new(Role::Tool, content)
    }

    /// Return a copy with `part` appended.
    #[must_use]
    pub fn with_part(&self, part: Part) -> Self {
        let mut copy = self.clone();
        copy.content.push(part);
        copy
    }

    /// Return a copy with one metadata entry set.
    #[must_use]
    pub fn with_metadata(&self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        let mut copy = self.clone();
        copy.metadata
            .get_or_insert_with(Metadata::new)
            .insert(key.into(), value.into());
        copy
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.content.iter().filter_map(Part::as_text).collect()
    }

    /// All tool requests, in order.
    pub fn tool_requests(&self) -> Vec<&ToolRequest> {
        self.content.iter().filter_map(Part::as_tool_request).collect()
    }

    /// Whether the message contains any tool request.
    pub fn has_tool_requests(&self) -> bool {
        self.content.iter().any(Part::is_tool_request)
    }

    /// Whether any part carries the given `purpose` metadata.
    pub fn has_part_with_purpose(&self, purpose: &str) -> bool {
        self.content.iter().any(|p| p.has_purpose(purpose))
    }

    /// Whether the message has no parts.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::parts::ToolRequest;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("system", Role::System)]
    #[case("USER", Role::User)]
    #[case("assistant", Role::Model)]
    #[case(" tool ", Role::Tool)]
    fn test_role_from_str(#[case] input: &str, #[case] expected: Role) {
        assert_eq!(input.parse::<Role>().unwrap(), expected);
    }

    #[test]
    fn test_role_from_str_unknown() {
        let err = "narrator".parse::<Role>().unwrap_err();
        assert!(err.to_string().contains("narrator"));
    }

    #[test]
    fn test_with_part_returns_copy() {
        let original = Message::system("Be terse.");
        let extended = original.with_part(Part::text(" Use JSON."));
        assert_eq!(original.content.len(), 1);
        assert_eq!(extended.text(), "Be terse. Use JSON.");
    }

    #[test]
    fn test_tool_requests_in_order() {
        let msg = Message::new(
            Role::Model,
            vec![
                Part::text("Let me check."),
                Part::tool_request(ToolRequest::new("a", json!({}))),
                Part::tool_request(ToolRequest::new("b", json!({}))),
            ],
        );
        let names: Vec<_> = msg.tool_requests().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(msg.has_tool_requests());
        assert_eq!(msg.text(), "Let me check.");
    }

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Model).unwrap(), "\"model\"");
    }
}
