//! Output format handlers.
//!
//! A handler turns a schema into model instructions and parses model output
//! back into structured data, both for complete messages and for streamed
//! chunks. Handlers are created per call; their streaming state lives in a
//! [`ChunkBuffer`] owned by the handler and is never shared between calls.

mod array;
mod enums;
mod json;
mod jsonl;
mod text;

pub use array::ArrayFormat;
pub use enums::EnumFormat;
pub use json::{default_constrained_instructions, JsonFormat};
pub use jsonl::JsonlFormat;
pub use text::TextFormat;

use flowkit_core::{Message, ModelResponseChunk, OutputConfig, Part};
use serde_json::Value as JsonValue;

use crate::error::Result;

/// Content type for newline-delimited JSON output.
pub const APPLICATION_JSONL: &str = "application/jsonl";

/// Content type for single enum-value output.
pub const TEXT_ENUM: &str = "text/enum";

/// Behaviour shared by every output format.
///
/// Implement this to plug a custom format into a
/// [`FormatRegistry`](crate::FormatRegistry).
pub trait Formatter: Send + Sync {
    /// Registered name of the format.
    fn name(&self) -> &str;

    /// Instructions to give a model that cannot constrain its own output.
    fn instructions(&self) -> Option<String>;

    /// Output block to put on the model request.
    fn config(&self) -> OutputConfig;

    /// Parse a complete model message into a structured value.
    fn parse_output(&self, message: &Message) -> Result<JsonValue>;

    /// Feed one streamed chunk and return the best value parsed so far.
    ///
    /// Incomplete output is never an error here; `Ok(None)` means there is
    /// nothing worth reporting yet.
    fn parse_chunk(&mut self, chunk: &ModelResponseChunk) -> Result<Option<JsonValue>>;

    /// Normalize a complete message before [`parse_output`](Self::parse_output).
    fn parse_message(&self, message: &Message) -> Result<Message> {
        Ok(message.clone())
    }
}

/// A resolved output format.
pub enum FormatHandler {
    /// Free text.
    Text(TextFormat),
    /// A single JSON value.
    Json(JsonFormat),
    /// One JSON object per line.
    Jsonl(JsonlFormat),
    /// One of a fixed set of strings.
    Enum(EnumFormat),
    /// A JSON array streamed item by item.
    Array(ArrayFormat),
    /// A user-registered format.
    Custom(Box<dyn Formatter>),
}

impl FormatHandler {
    fn inner(&self) -> &dyn Formatter {
        match self {
            Self::Text(f) => f,
            Self::Json(f) => f,
            Self::Jsonl(f) => f,
            Self::Enum(f) => f,
            Self::Array(f) => f,
            Self::Custom(f) => f.as_ref(),
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Formatter {
        match self {
            Self::Text(f) => f,
            Self::Json(f) => f,
            Self::Jsonl(f) => f,
            Self::Enum(f) => f,
            Self::Array(f) => f,
            Self::Custom(f) => f.as_mut(),
        }
    }

    /// Registered name of the format.
    pub fn name(&self) -> &str {
        self.inner().name()
    }

    /// See [`Formatter::instructions`].
    pub fn instructions(&self) -> Option<String> {
        self.inner().instructions()
    }

    /// See [`Formatter::config`].
    pub fn config(&self) -> OutputConfig {
        self.inner().config()
    }

    /// See [`Formatter::parse_output`].
    pub fn parse_output(&self, message: &Message) -> Result<JsonValue> {
        self.inner().parse_output(message)
    }

    /// See [`Formatter::parse_chunk`].
    pub fn parse_chunk(&mut self, chunk: &ModelResponseChunk) -> Result<Option<JsonValue>> {
        self.inner_mut().parse_chunk(chunk)
    }

    /// See [`Formatter::parse_message`].
    pub fn parse_message(&self, message: &Message) -> Result<Message> {
        self.inner().parse_message(message)
    }
}

impl std::fmt::Debug for FormatHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FormatHandler").field(&self.name()).finish()
    }
}

/// Accumulated streaming text for one output stream.
#[derive(Debug, Clone, Default)]
pub struct ChunkBuffer {
    text: String,
    cursor: usize,
    index: Option<usize>,
}

impl ChunkBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk's text, starting over when its index differs from
    /// the stream seen so far.
    pub fn push(&mut self, chunk: &ModelResponseChunk) {
        if self.index != Some(chunk.index) {
            self.text.clear();
            self.cursor = 0;
            self.index = Some(chunk.index);
        }
        self.text.push_str(&chunk.text_content());
    }

    /// Everything accumulated for the current stream.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text after the cursor.
    pub fn unread(&self) -> &str {
        self.text.get(self.cursor..).unwrap_or_default()
    }

    /// Byte offset already consumed.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move the cursor.
    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor.min(self.text.len());
    }

    /// Index of the current stream.
    pub fn index(&self) -> Option<usize> {
        self.index
    }
}

/// Text of a message's text and JSON parts, in order.
pub(crate) fn content_text(message: &Message) -> String {
    message
        .content
        .iter()
        .filter_map(|p| p.as_text().or_else(|| p.as_json()))
        .collect()
}

/// Replace a message's text/JSON parts with `parts`, keeping the others in place
/// after them.
pub(crate) fn replace_text_parts(message: &Message, parts: Vec<Part>) -> Message {
    let mut content = parts;
    content.extend(
        message
            .content
            .iter()
            .filter(|p| !p.is_text() && !p.is_json())
            .cloned(),
    );
    Message {
        role: message.role,
        content,
        metadata: message.metadata.clone(),
    }
}
