//! # flowkit-tools
//!
//! Tools the generation loop can call on the model's behalf.
//!
//! - **[`Tool`]**: the capability the driver depends on, a name plus `run_raw`
//! - **[`ToolDefinition`]**: the JSON Schema description sent to the model
//! - **[`FunctionTool`]** / **[`SyncFunctionTool`]**: closure-backed tools
//! - **[`ToolRegistry`]**: name-ordered lookup
//!
//! ## Example
//!
//! ```rust
//! use flowkit_tools::{SyncFunctionTool, ToolRegistry};
//! use serde_json::json;
//!
//! let mut registry = ToolRegistry::new();
//! registry
//!     .register(SyncFunctionTool::new(
//!         "add",
//!         "Add two numbers",
//!         json!({"type": "object"}),
//!         |args| Ok(json!(args["a"].as_f64().unwrap_or(0.0) + args["b"].as_f64().unwrap_or(0.0))),
//!     ))
//!     .unwrap();
//!
//! assert!(registry.contains("add"));
//! assert_eq!(registry.definitions()[0].name, "add");
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod definition;
pub mod errors;
pub mod registry;
pub mod tool;

pub use definition::ToolDefinition;
pub use errors::{ToolError, ToolResult};
pub use registry::ToolRegistry;
pub use tool::{BoxedTool, FunctionTool, SyncFunctionTool, Tool};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        BoxedTool, FunctionTool, SyncFunctionTool, Tool, ToolDefinition, ToolError, ToolRegistry,
        ToolResult,
    };
}
