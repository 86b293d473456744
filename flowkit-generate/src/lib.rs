//! # flowkit-generate
//!
//! The generation driver for flowkit. A [`Registry`] holds models, tools,
//! output formats, template helpers and prompts; generating renders a
//! prompt, calls the model, runs requested tools and parses the final
//! output with the prompt's format.
//!
//! ## Example
//!
//! ```rust
//! use flowkit_generate::{GenerateOptions, Registry};
//! use flowkit_models::MockModel;
//! use flowkit_prompt::Prompt;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let mut registry = Registry::new();
//! registry.register_model(MockModel::new("mock").with_text_response(r#"{"city": "Oslo"}"#))?;
//! registry.define_prompt(
//!     Prompt::builder("capital")
//!         .model("mock")
//!         .prompt("What is the capital of {{country}}?")
//!         .output_schema(json!({"type": "object", "properties": {"city": {"type": "string"}}})),
//! )?;
//!
//! let response = registry
//!     .run_prompt("capital", &json!({"country": "Norway"}), GenerateOptions::new())
//!     .await?;
//! assert_eq!(response.output(), Some(&json!({"city": "Oslo"})));
//! # Ok::<(), flowkit_generate::GenerateError>(())
//! # });
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod driver;
pub mod error;
pub mod options;
pub mod registry;
pub mod response;

pub use driver::DEFAULT_MAX_TURNS;
pub use error::{GenerateError, Result};
pub use options::{GenerateChunk, GenerateOptions, StreamCallback};
pub use registry::{Registry, ADHOC_PROMPT_NAME};
pub use response::GenerateResponse;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{GenerateError, GenerateOptions, GenerateResponse, Registry};
}
