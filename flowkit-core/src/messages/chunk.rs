//! Streaming response chunks.

use serde::{Deserialize, Serialize};

use super::message::Role;
use super::parts::{Part, ToolRequest};

/// One streamed slice of model output.
///
/// Chunks belonging to the same logical output stream share an `index`.
/// A change of `index` marks the start of a new stream; consumers that
/// accumulate chunk text must reset when it happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponseChunk {
    /// Output stream index.
    #[serde(default)]
    pub index: usize,
    /// Author of the streamed content.
    #[serde(default = "default_chunk_role")]
    pub role: Role,
    /// Content delivered by this chunk.
    pub content: Vec<Part>,
}

fn default_chunk_role() -> Role {
    Role::Model
}

impl ModelResponseChunk {
    /// Create a chunk for a stream index.
    pub fn new(index: usize, content: Vec<Part>) -> Self {
        Self {
            index,
            role: Role::Model,
            content,
        }
    }

    /// Create a single text chunk.
    pub fn text(index: usize, text: impl Into<String>) -> Self {
        Self::new(index, vec![Part::text(text)])
    }

    /// Return the same content re-addressed to another stream index.
    #[must_use]
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Concatenated text of the chunk's text parts.
    pub fn text_content(&self) -> String {
        self.content.iter().filter_map(Part::as_text).collect()
    }

    /// Tool requests carried by this chunk.
    pub fn tool_requests(&self) -> Vec<&ToolRequest> {
        self.content.iter().filter_map(Part::as_tool_request).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_text_concatenates_text_parts() {
        let chunk = ModelResponseChunk::new(0, vec![Part::text("{\"a\""), Part::text(": 1}")]);
        assert_eq!(chunk.text_content(), "{\"a\": 1}");
        assert_eq!(chunk.role, Role::Model);
    }

    #[test]
    fn test_with_index() {
        let chunk = ModelResponseChunk::text(0, "x").with_index(3);
        assert_eq!(chunk.index, 3);
    }
}
