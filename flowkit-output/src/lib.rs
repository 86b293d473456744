//! # flowkit-output
//!
//! Structured output for flowkit: format handlers, format resolution,
//! JSON Schema validation and partial-JSON recovery for streams.
//!
//! ## Formats
//!
//! | Name    | Schema                         | Parses to                       |
//! |---------|--------------------------------|---------------------------------|
//! | `text`  | ignored                        | the message text                |
//! | `json`  | optional                       | one JSON value                  |
//! | `jsonl` | `type: array` with `items`     | array, one object per line      |
//! | `enum`  | `enum` list (top-level or prop) | the chosen string              |
//! | `array` | `type: array`                  | array, streamed item by item    |
//!
//! ## Example
//!
//! ```rust
//! use flowkit_core::Message;
//! use flowkit_output::resolve_format;
//! use serde_json::json;
//!
//! let schema = json!({"type": "object", "properties": {"city": {"type": "string"}}});
//! let handler = resolve_format(Some(&schema), None).unwrap();
//! assert_eq!(handler.name(), "json");
//!
//! let value = handler
//!     .parse_output(&Message::model("```json\n{\"city\": \"Paris\"}\n```"))
//!     .unwrap();
//! assert_eq!(value, json!({"city": "Paris"}));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod extract;
pub mod formats;
pub mod partial;
pub mod registry;
pub mod schema;

pub use error::{OutputError, Result};
pub use extract::{extract_items, extract_json_from_markdown};
pub use formats::{
    default_constrained_instructions, ArrayFormat, ChunkBuffer, EnumFormat, FormatHandler,
    Formatter, JsonFormat, JsonlFormat, TextFormat,
};
pub use partial::parse_partial_json;
pub use registry::{resolve_format, resolve_instructions, FormatConstructor, FormatRegistry};
pub use schema::{validate_is_json_array, validate_raw, validate_value, SchemaValidator};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        resolve_format, resolve_instructions, FormatHandler, FormatRegistry, Formatter,
        OutputError,
    };
}
