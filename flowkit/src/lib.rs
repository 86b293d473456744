//! # flowkit - Prompts, Structured Output and Tool Loops for LLM Flows
//!
//! flowkit is the generation core of an AI flow runtime. It renders prompt
//! templates into model requests, simulates schema-constrained output for
//! models that cannot enforce it, parses (and streams) structured output,
//! and drives the tool-calling loop.
//!
//! ## Quick Start
//!
//! ```rust
//! use flowkit::prelude::*;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let mut registry = Registry::new();
//! registry.register_model(MockModel::new("mock").with_text_response("blue"))?;
//! registry.set_default_model("mock");
//!
//! let response = registry
//!     .generate(
//!         GenerateOptions::new()
//!             .prompt("Pick a color.")
//!             .output_format("enum")
//!             .output_schema(json!({"type": "string", "enum": ["red", "blue"]})),
//!     )
//!     .await?;
//! assert_eq!(response.output(), Some(&json!("blue")));
//! # Ok::<(), GenerateError>(())
//! # });
//! ```
//!
//! ## Architecture
//!
//! flowkit is organized as a workspace of focused crates:
//!
//! - [`flowkit_core`] - Messages, parts, chunks, output and generation config
//! - [`flowkit_tools`] - Tool trait, definitions and registry
//! - [`flowkit_output`] - Output formats, format resolution, schema validation
//! - [`flowkit_models`] - Model trait, requests, middleware and mock models
//! - [`flowkit_prompt`] - Template engine and prompt configuration
//! - [`flowkit_generate`] - Registry and the generation loop

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// Crate Re-exports
// ============================================================================

/// Messages, parts and configuration.
pub use flowkit_core as core;

/// Tool system.
pub use flowkit_tools as tools;

/// Output formats.
pub use flowkit_output as output;

/// Models and middleware.
pub use flowkit_models as models;

/// Prompt templates and configuration.
pub use flowkit_prompt as prompt;

/// Registry and generation loop.
pub use flowkit_generate as generate;

// ============================================================================
// Type Re-exports (Flat)
// ============================================================================

// Messages
pub use flowkit_core::{
    GenerationConfig, Message, ModelResponseChunk, OutputConfig, Part, PartKind, Role,
    ToolRequest, ToolResponse,
};

// Tools
pub use flowkit_tools::{FunctionTool, SyncFunctionTool, Tool, ToolDefinition, ToolError, ToolRegistry};

// Output
pub use flowkit_output::{FormatHandler, FormatRegistry, Formatter, OutputError};

// Models
pub use flowkit_models::{
    ConstrainedSupport, MiddlewareModel, Model, ModelError, ModelInfo, ModelRequest,
    ModelResponse, ToolChoice,
};

// Prompts
pub use flowkit_prompt::{Prompt, PromptBuilder, PromptConfig, PromptError, TemplateEngine};

// Generation
pub use flowkit_generate::{
    GenerateChunk, GenerateError, GenerateOptions, GenerateResponse, Registry,
};

// ============================================================================
// Prelude
// ============================================================================

/// Prelude for common imports.
///
/// ```rust
/// use flowkit::prelude::*;
/// ```
pub mod prelude {
    pub use flowkit_core::{GenerationConfig, Message, Part, Role};
    pub use flowkit_generate::{
        GenerateChunk, GenerateError, GenerateOptions, GenerateResponse, Registry,
    };
    pub use flowkit_models::{FunctionModel, MockModel, Model, ModelInfo, ToolChoice};
    pub use flowkit_output::FormatRegistry;
    pub use flowkit_prompt::{Prompt, TemplateEngine};
    pub use flowkit_tools::{FunctionTool, SyncFunctionTool, Tool, ToolDefinition, ToolResult};
}
