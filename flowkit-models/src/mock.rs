//! Mock and function-based models for testing.
//!
//! - [`MockModel`]: a queue of scripted responses, optionally streamed
//! - [`FunctionModel`]: responses computed from each request
//!
//! Both record every request they receive.
//!
//! ```rust
//! use flowkit_models::MockModel;
//!
//! let model = MockModel::new("test")
//!     .with_text_response("First response")
//!     .with_streamed_text(&["Sec", "ond"]);
//! ```

use async_trait::async_trait;
use flowkit_core::{Message, ModelResponseChunk, Part, Role, ToolRequest};
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::ModelError;
use crate::model::{ChunkSink, Model, ModelInfo};
use crate::request::{ModelRequest, ModelResponse};

#[derive(Debug, Clone)]
struct Scripted {
    response: ModelResponse,
    chunks: Vec<ModelResponseChunk>,
}

/// A mock model returning pre-configured responses in order.
///
/// Once the queue is empty it answers `"Mock response"`.
#[derive(Debug, Clone)]
pub struct MockModel {
    name: String,
    info: ModelInfo,
    responses: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl MockModel {
    /// Create a new mock model.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            info: ModelInfo::new(name.clone()),
            name,
            responses: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the capability info.
    #[must_use]
    pub fn with_info(mut self, info: ModelInfo) -> Self {
        self.info = info;
        self
    }

    /// Queue a response.
    #[must_use]
    pub fn with_response(self, response: ModelResponse) -> Self {
        self.responses.lock().push_back(Scripted {
            response,
            chunks: Vec::new(),
        });
        self
    }

    /// Queue a text response.
    #[must_use]
    pub fn with_text_response(self, text: impl Into<String>) -> Self {
        self.with_response(ModelResponse::text(text))
    }

    /// Queue a response requesting one tool call.
    #[must_use]
    pub fn with_tool_call(self, name: impl Into<String>, input: JsonValue) -> Self {
        let message = Message::new(
            Role::Model,
            vec![Part::tool_request(ToolRequest::new(name, input))],
        );
        self.with_response(ModelResponse::new(message))
    }

    /// Queue a text response delivered as one chunk per piece.
    #[must_use]
    pub fn with_streamed_text(self, pieces: &[&str]) -> Self {
        let chunks = pieces
            .iter()
            .map(|p| ModelResponseChunk::text(0, *p))
            .collect();
        self.responses.lock().push_back(Scripted {
            response: ModelResponse::text(pieces.concat()),
            chunks,
        });
        self
    }

    /// Queue a response preceded by explicit chunks.
    #[must_use]
    pub fn with_streamed_response(self, response: ModelResponse, chunks: Vec<ModelResponseChunk>) -> Self {
        self.responses.lock().push_back(Scripted { response, chunks });
        self
    }

    /// Requests received so far.
    pub fn recorded_requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests received so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Model for MockModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> &ModelInfo {
        &self.info
    }

    async fn generate(
        &self,
        request: &ModelRequest,
        stream: Option<&mut ChunkSink<'_>>,
    ) -> Result<ModelResponse, ModelError> {
        self.requests.lock().push(request.clone());

        let next = self.responses.lock().pop_front();
        let scripted = next.unwrap_or_else(|| Scripted {
            response: ModelResponse::text("Mock response"),
            chunks: Vec::new(),
        });

        if let Some(sink) = stream {
            for chunk in scripted.chunks {
                sink(chunk)?;
            }
        }
        Ok(scripted.response)
    }
}

/// Signature of a [`FunctionModel`] callback.
pub type FunctionDef =
    dyn Fn(&ModelRequest) -> Result<ModelResponse, ModelError> + Send + Sync;

/// A model controlled by a local function.
///
/// When streaming is requested the returned message is also delivered as a
/// single chunk.
#[derive(Clone)]
pub struct FunctionModel {
    name: String,
    info: ModelInfo,
    function: Arc<FunctionDef>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl FunctionModel {
    /// Create a new function model.
    pub fn new<F>(function: F) -> Self
    where
        F: Fn(&ModelRequest) -> Result<ModelResponse, ModelError> + Send + Sync + 'static,
    {
        Self {
            name: "function-model".to_string(),
            info: ModelInfo::new("function-model"),
            function: Arc::new(function),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set a custom model name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the capability info.
    #[must_use]
    pub fn with_info(mut self, info: ModelInfo) -> Self {
        self.info = info;
        self
    }

    /// Requests received so far.
    pub fn recorded_requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests received so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl std::fmt::Debug for FunctionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionModel")
            .field("name", &self.name)
            .field("info", &self.info)
            .finish()
    }
}

#[async_trait]
impl Model for FunctionModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> &ModelInfo {
        &self.info
    }

    async fn generate(
        &self,
        request: &ModelRequest,
        stream: Option<&mut ChunkSink<'_>>,
    ) -> Result<ModelResponse, ModelError> {
        self.requests.lock().push(request.clone());
        let response = (self.function)(request)?;
        if let Some(sink) = stream {
            sink(ModelResponseChunk::new(0, response.message.content.clone()))?;
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_returns_in_order_then_default() {
        let model = MockModel::new("m")
            .with_text_response("one")
            .with_tool_call("lookup", json!({"q": "x"}));
        let req = ModelRequest::new(vec![Message::user("hi")]);

        assert_eq!(model.generate(&req, None).await.unwrap().text_content(), "one");
        let second = model.generate(&req, None).await.unwrap();
        assert_eq!(second.tool_requests()[0].name, "lookup");
        assert_eq!(
            model.generate(&req, None).await.unwrap().text_content(),
            "Mock response"
        );
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_streams_chunks() {
        let model = MockModel::new("m").with_streamed_text(&["Hel", "lo"]);
        let mut seen = Vec::new();
        let mut sink = |chunk: ModelResponseChunk| {
            seen.push(chunk.text_content());
            Ok::<(), ModelError>(())
        };
        let resp = model
            .generate(&ModelRequest::default(), Some(&mut sink))
            .await
            .unwrap();
        assert_eq!(resp.text_content(), "Hello");
        assert_eq!(seen, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_function_model() {
        let model = FunctionModel::new(|req| {
            Ok(ModelResponse::text(format!("{} messages", req.messages.len())))
        })
        .with_name("counter");
        let req = ModelRequest::new(vec![Message::user("a"), Message::user("b")]);
        assert_eq!(model.generate(&req, None).await.unwrap().text_content(), "2 messages");
        assert_eq!(model.name(), "counter");
        assert_eq!(model.recorded_requests()[0], req);
    }

    #[test]
    fn test_sink_error_propagates() {
        let model = MockModel::new("m").with_streamed_text(&["x"]);
        let mut sink = |_: ModelResponseChunk| Err::<(), _>(ModelError::stream("closed"));
        let result = tokio_test::block_on(model.generate(&ModelRequest::default(), Some(&mut sink)));
        assert!(matches!(result, Err(ModelError::Stream(_))));
    }
}
