//! # flowkit-core
//!
//! Core types shared by every flowkit crate.
//!
//! - **Messages**: [`Message`], [`Part`] and [`Role`], the ordered conversation model
//! - **Chunks**: [`ModelResponseChunk`], one streamed slice of a model turn
//! - **Output**: [`OutputConfig`], the output block carried on every model request
//! - **Settings**: [`GenerationConfig`], provider-agnostic generation parameters
//!
//! ## Example
//!
//! ```rust
//! use flowkit_core::{Message, Part, Role};
//!
//! let msg = Message::user("What is the capital of France?");
//! assert_eq!(msg.role, Role::User);
//!
//! // Messages are never mutated in place; helpers return copies.
//! let tagged = msg.with_part(Part::text("Answer briefly.").with_metadata("purpose", "output"));
//! assert_eq!(msg.content.len(), 1);
//! assert_eq!(tagged.content.len(), 2);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod errors;
pub mod messages;
pub mod output;
pub mod settings;

pub use errors::{CoreError, Result};
pub use messages::{
    Message, Metadata, ModelResponseChunk, Part, PartKind, Role, ToolRequest, ToolResponse,
};
pub use output::OutputConfig;
pub use settings::GenerationConfig;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        GenerationConfig, Message, Metadata, ModelResponseChunk, OutputConfig, Part, PartKind,
        Role, ToolRequest, ToolResponse,
    };
}
