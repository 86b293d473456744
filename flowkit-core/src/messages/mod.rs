//! Message types for model interactions.
//!
//! A conversation is an ordered list of [`Message`]s, each holding an
//! ordered list of [`Part`]s. Streaming model output arrives as
//! [`ModelResponseChunk`]s that share an `index` per logical output stream.

pub mod chunk;
pub mod message;
pub mod parts;

pub use chunk::ModelResponseChunk;
pub use message::{Message, Role};
pub use parts::{Metadata, Part, PartKind, ToolRequest, ToolResponse};
