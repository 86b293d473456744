//! # flowkit-prompt
//!
//! Prompt definitions for flowkit: a Handlebars-compatible template engine
//! that renders to structured messages, prompt configuration with
//! build-time validation, and rendering into model requests.
//!
//! ## Example
//!
//! ```rust
//! use flowkit_core::Message;
//! use flowkit_output::FormatRegistry;
//! use flowkit_prompt::{Prompt, TemplateEngine};
//! use serde_json::json;
//!
//! let prompt = Prompt::builder("greet")
//!     .system("You are {{persona}}.")
//!     .prompt("Say hello to {{name}}.")
//!     .default_input(&json!({"persona": "cheerful"}))
//!     .build()
//!     .unwrap();
//!
//! let rendered = prompt
//!     .render(&TemplateEngine::new(), &FormatRegistry::default(), &json!({"name": "Ada"}), &[])
//!     .unwrap();
//! assert_eq!(
//!     rendered.messages,
//!     vec![Message::system("You are cheerful."), Message::user("Say hello to Ada.")]
//! );
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod input;
pub mod prompt;
pub mod template;

pub use config::{MessagesFn, PromptBuilder, PromptConfig, TextFn};
pub use error::{ConfigConflict, PromptError, Result};
pub use input::{merge_defaults, to_variables, value_to_variables, Variables};
pub use prompt::{Prompt, RenderedPrompt};
pub use template::{
    assemble_messages, Assembled, HelperFn, Segment, Template, TemplateEngine, HISTORY_PURPOSE,
};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        Prompt, PromptBuilder, PromptError, RenderedPrompt, Segment, Template, TemplateEngine,
    };
}
