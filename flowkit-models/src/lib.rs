//! # flowkit-models
//!
//! The model side of flowkit: the [`Model`] capability with its
//! [`ModelInfo`] descriptor, the [`ModelRequest`]/[`ModelResponse`] pair,
//! request-rewriting middleware and test doubles.
//!
//! ## Middleware
//!
//! - [`ConstrainedGeneration`]: simulates schema-constrained output on models
//!   that cannot enforce it natively
//! - [`SimulateSystemPrompt`]: folds system messages into user turns
//! - [`ValidateSupport`]: rejects requests a model cannot handle
//!
//! ```rust
//! use std::sync::Arc;
//! use flowkit_models::{ConstrainedGeneration, MiddlewareModel, MockModel, Model};
//!
//! let model = MiddlewareModel::new(Arc::new(MockModel::new("echo")))
//!     .with(ConstrainedGeneration::new());
//! assert_eq!(model.name(), "echo");
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod middleware;
pub mod mock;
pub mod model;
pub mod request;

pub use error::{ModelError, ModelResult};
pub use middleware::{
    inject_output_instructions, ConstrainedGeneration, InstructionsFn, MiddlewareModel,
    ModelMiddleware, SimulateSystemPrompt, ValidateSupport, OUTPUT_PURPOSE, PENDING_KEY,
};
pub use mock::{FunctionDef, FunctionModel, MockModel};
pub use model::{BoxedModel, ChunkSink, ConstrainedSupport, Model, ModelInfo, Supports};
pub use request::{FinishReason, ModelRequest, ModelResponse, ToolChoice, Usage};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        BoxedModel, ConstrainedSupport, Model, ModelError, ModelInfo, ModelRequest,
        ModelResponse, Supports, ToolChoice,
    };
}
