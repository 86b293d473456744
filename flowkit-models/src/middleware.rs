//! Request-rewriting middleware and the model wrapper that applies it.
//!
//! Middleware sees each request before the wrapped model does and may
//! rewrite it using the model's [`ModelInfo`]. The chain runs in order.

use async_trait::async_trait;
use flowkit_core::{Message, Part, PartKind, Role};
use flowkit_output::default_constrained_instructions;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::debug;

use crate::error::ModelError;
use crate::model::{BoxedModel, ChunkSink, ConstrainedSupport, Model, ModelInfo};
use crate::request::{ModelRequest, ModelResponse};

/// Metadata `purpose` value marking injected output instructions.
pub const OUTPUT_PURPOSE: &str = "output";

/// A request transformation run before a model call.
pub trait ModelMiddleware: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Rewrite `request` for a model described by `info`.
    fn apply(&self, info: &ModelInfo, request: ModelRequest) -> Result<ModelRequest, ModelError>;
}

/// Metadata flag set on a placeholder part that is waiting for content.
pub const PENDING_KEY: &str = "pending";

/// Add output instructions to a message list.
///
/// A pending `purpose: "output"` placeholder (left by a template's
/// `{{section "output"}}`) is filled in place. Otherwise the instructions
/// become a text part tagged `purpose: "output"` on the system message, or
/// on the last user message if there is no system message. Returns `None`
/// when nothing was added: the list already carries output instructions, or
/// has neither a system nor a user message.
pub fn inject_output_instructions(messages: &[Message], instructions: &str) -> Option<Vec<Message>> {
    let part = Part::text(instructions).with_metadata("purpose", OUTPUT_PURPOSE);
    for (mi, message) in messages.iter().enumerate() {
        let pending = message.content.iter().position(|p| {
            p.has_purpose(OUTPUT_PURPOSE)
                && p.metadata_value(PENDING_KEY).and_then(JsonValue::as_bool) == Some(true)
        });
        if let Some(pi) = pending {
            let mut out = messages.to_vec();
            out[mi].content[pi] = part;
            return Some(out);
        }
    }
    if messages.iter().any(|m| m.has_part_with_purpose(OUTPUT_PURPOSE)) {
        return None;
    }
    let target = messages
        .iter()
        .position(|m| m.role == Role::System)
        .or_else(|| messages.iter().rposition(|m| m.role == Role::User))?;
    let mut out = messages.to_vec();
    out[target] = messages[target].with_part(part);
    Some(out)
}

/// Renders fallback instructions from a schema.
pub type InstructionsFn = fn(&JsonValue) -> String;

/// Simulates constrained decoding on models that cannot do it natively.
///
/// When the model's [`ConstrainedSupport`] does not cover the request and the
/// request asks for constrained output, schema instructions are injected
/// into the prompt and `output.constrained` is switched off. Models that
/// can constrain natively get the request untouched.
#[derive(Debug, Clone)]
pub struct ConstrainedGeneration {
    instructions: InstructionsFn,
}

impl Default for ConstrainedGeneration {
    fn default() -> Self {
        Self {
            instructions: default_constrained_instructions,
        }
    }
}

impl ConstrainedGeneration {
    /// Middleware using the default JSON instructions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom instruction renderer.
    #[must_use]
    pub fn with_instructions(mut self, instructions: InstructionsFn) -> Self {
        self.instructions = instructions;
        self
    }
}

impl ModelMiddleware for ConstrainedGeneration {
    fn name(&self) -> &str {
        "constrained_generation"
    }

    fn apply(&self, info: &ModelInfo, mut request: ModelRequest) -> Result<ModelRequest, ModelError> {
        let native = match info.supports.constrained {
            ConstrainedSupport::None => false,
            ConstrainedSupport::NoTools => request.tools.is_empty(),
            ConstrainedSupport::All => true,
        };
        if native {
            return Ok(request);
        }
        if !request.output.constrained || request.messages.is_empty() {
            return Ok(request);
        }
        let Some(schema) = request.output.schema.clone() else {
            return Ok(request);
        };

        let instructions = (self.instructions)(&schema);
        match inject_output_instructions(&request.messages, &instructions) {
            Some(messages) => {
                debug!(support = ?info.supports.constrained, tools = request.tools.len(), "Injected constrained output instructions");
                request.messages = messages;
            }
            None => debug!("Output instructions already present or no target message"),
        }
        request.output.constrained = false;
        Ok(request)
    }
}

/// Rewrites system messages for models without a system role.
///
/// Each system message becomes a user message (prefixed with a preface)
/// followed by a model acknowledgement.
#[derive(Debug, Clone)]
pub struct SimulateSystemPrompt {
    preface: String,
    acknowledgement: String,
}

impl Default for SimulateSystemPrompt {
    fn default() -> Self {
        Self {
            preface: "SYSTEM INSTRUCTIONS:\n".to_string(),
            acknowledgement: "Understood.".to_string(),
        }
    }
}

impl SimulateSystemPrompt {
    /// Middleware with the default preface and acknowledgement.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the preface.
    #[must_use]
    pub fn with_preface(mut self, preface: impl Into<String>) -> Self {
        self.preface = preface.into();
        self
    }

    /// Set the acknowledgement.
    #[must_use]
    pub fn with_acknowledgement(mut self, acknowledgement: impl Into<String>) -> Self {
        self.acknowledgement = acknowledgement.into();
        self
    }
}

impl ModelMiddleware for SimulateSystemPrompt {
    fn name(&self) -> &str {
        "simulate_system_prompt"
    }

    fn apply(&self, info: &ModelInfo, mut request: ModelRequest) -> Result<ModelRequest, ModelError> {
        if info.supports.system_role || !request.messages.iter().any(|m| m.role == Role::System) {
            return Ok(request);
        }
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        for message in request.messages {
            if message.role != Role::System {
                messages.push(message);
                continue;
            }
            let mut content = Vec::with_capacity(message.content.len() + 1);
            if !self.preface.is_empty() {
                content.push(Part::text(self.preface.clone()));
            }
            content.extend(message.content);
            messages.push(Message {
                role: Role::User,
                content,
                metadata: message.metadata,
            });
            messages.push(Message::model(self.acknowledgement.clone()));
        }
        request.messages = messages;
        Ok(request)
    }
}

/// Rejects requests using features the model lacks.
#[derive(Debug, Clone, Default)]
pub struct ValidateSupport {
    model: String,
}

impl ValidateSupport {
    /// Validation for the named model.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

impl ModelMiddleware for ValidateSupport {
    fn name(&self) -> &str {
        "validate_support"
    }

    fn apply(&self, info: &ModelInfo, request: ModelRequest) -> Result<ModelRequest, ModelError> {
        let supports = &info.supports;
        let unsupported = |feature: &str| Err(ModelError::unsupported(&self.model, feature));

        if !supports.media
            && request
                .messages
                .iter()
                .flat_map(|m| &m.content)
                .any(|p| matches!(p.kind, PartKind::Media { .. }))
        {
            return unsupported("media");
        }
        if !supports.tools && !request.tools.is_empty() {
            return unsupported("tool use");
        }
        if !supports.multiturn && request.messages.len() > 1 {
            return unsupported("multiturn messages");
        }
        if !supports.system_role && request.messages.iter().any(|m| m.role == Role::System) {
            return unsupported("the system role");
        }
        Ok(request)
    }
}

/// A model wrapped with a middleware chain.
#[derive(Clone)]
pub struct MiddlewareModel {
    inner: BoxedModel,
    middleware: Vec<Arc<dyn ModelMiddleware>>,
}

impl MiddlewareModel {
    /// Wrap a model with an empty chain.
    #[must_use]
    pub fn new(inner: BoxedModel) -> Self {
        Self {
            inner,
            middleware: Vec::new(),
        }
    }

    /// Append a middleware to the chain.
    #[must_use]
    pub fn with<M: ModelMiddleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Names of the installed middleware, in order.
    pub fn middleware_names(&self) -> Vec<&str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }

    /// Run the chain over a request without calling the model.
    ///
    /// # Errors
    ///
    /// The first middleware error.
    pub fn prepare(&self, request: ModelRequest) -> Result<ModelRequest, ModelError> {
        let info = self.inner.info();
        self.middleware
            .iter()
            .try_fold(request, |req, m| m.apply(info, req))
    }
}

impl std::fmt::Debug for MiddlewareModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareModel")
            .field("model", &self.inner.name())
            .field("middleware", &self.middleware_names())
            .finish()
    }
}

#[async_trait]
impl Model for MiddlewareModel {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn info(&self) -> &ModelInfo {
        self.inner.info()
    }

    async fn generate(
        &self,
        request: &ModelRequest,
        stream: Option<&mut ChunkSink<'_>>,
    ) -> Result<ModelResponse, ModelError> {
        let prepared = self.prepare(request.clone())?;
        let mut response = self.inner.generate(&prepared, stream).await?;
        if response.request.is_none() {
            response.request = Some(Box::new(prepared));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockModel;
    use crate::model::Supports;
    use flowkit_core::OutputConfig;
    use flowkit_tools::ToolDefinition;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn schema() -> JsonValue {
        json!({"type": "object", "properties": {"answer": {"type": "string"}}})
    }

    fn constrained_request(messages: Vec<Message>) -> ModelRequest {
        ModelRequest::new(messages).with_output(
            OutputConfig::new()
                .with_format("json")
                .with_schema(schema())
                .with_constrained(true),
        )
    }

    fn info(constrained: ConstrainedSupport) -> ModelInfo {
        ModelInfo::new("test").with_constrained(constrained)
    }

    fn injected_parts(messages: &[Message]) -> usize {
        messages
            .iter()
            .flat_map(|m| &m.content)
            .filter(|p| p.has_purpose(OUTPUT_PURPOSE))
            .count()
    }

    #[test]
    fn test_injects_into_system_message() {
        let req = constrained_request(vec![Message::system("Be brief."), Message::user("Hi")]);
        let out = ConstrainedGeneration::new()
            .apply(&info(ConstrainedSupport::None), req)
            .unwrap();
        assert!(!out.output.constrained);
        assert_eq!(injected_parts(&out.messages), 1);
        assert_eq!(out.messages[0].content.len(), 2);
        assert!(out.messages[0].content[1]
            .as_text()
            .unwrap()
            .starts_with("Output should be in JSON format"));
        assert_eq!(out.messages[1], Message::user("Hi"));
    }

    #[test]
    fn test_injects_into_last_user_message() {
        let req = constrained_request(vec![
            Message::user("first"),
            Message::model("ok"),
            Message::user("second"),
        ]);
        let out = ConstrainedGeneration::new()
            .apply(&info(ConstrainedSupport::None), req)
            .unwrap();
        assert_eq!(injected_parts(&out.messages), 1);
        assert!(out.messages[2].has_part_with_purpose(OUTPUT_PURPOSE));
        assert!(!out.messages[0].has_part_with_purpose(OUTPUT_PURPOSE));
    }

    #[test]
    fn test_twice_does_not_duplicate() {
        let mw = ConstrainedGeneration::new();
        let info = info(ConstrainedSupport::None);
        let once = mw
            .apply(&info, constrained_request(vec![Message::user("Hi")]))
            .unwrap();
        let again = mw
            .apply(&info, constrained_request(once.messages.clone()))
            .unwrap();
        assert_eq!(injected_parts(&again.messages), 1);
        assert_eq!(again.messages, once.messages);
        assert!(!again.output.constrained);
    }

    #[test]
    fn test_no_target_leaves_messages() {
        let req = constrained_request(vec![Message::model("hello")]);
        let out = ConstrainedGeneration::new()
            .apply(&info(ConstrainedSupport::None), req.clone())
            .unwrap();
        assert_eq!(out.messages, req.messages);
        assert!(!out.output.constrained);
    }

    #[test]
    fn test_fills_pending_output_section() {
        let placeholder = Part::text("")
            .with_metadata("purpose", OUTPUT_PURPOSE)
            .with_metadata(PENDING_KEY, true);
        let messages = vec![
            Message::system("Be brief."),
            Message::new(Role::User, vec![Part::text("Describe a cat."), placeholder]),
        ];
        let out = inject_output_instructions(&messages, "Reply in JSON.").unwrap();
        assert_eq!(out[0], messages[0]);
        assert_eq!(out[1].content[1].as_text(), Some("Reply in JSON."));
        assert!(out[1].content[1].metadata_value(PENDING_KEY).is_none());
        assert!(inject_output_instructions(&out, "Reply in JSON.").is_none());
    }

    #[rstest]
    #[case::native(ConstrainedSupport::All, false, true)]
    #[case::native_with_tools(ConstrainedSupport::All, true, true)]
    #[case::no_tools_support(ConstrainedSupport::NoTools, false, true)]
    #[case::no_tools_support_with_tools(ConstrainedSupport::NoTools, true, false)]
    #[case::unsupported(ConstrainedSupport::None, false, false)]
    #[case::unsupported_with_tools(ConstrainedSupport::None, true, false)]
    fn test_constrained_support_matrix(
        #[case] support: ConstrainedSupport,
        #[case] with_tools: bool,
        #[case] passthrough: bool,
    ) {
        let mut req = constrained_request(vec![Message::user("Hi")]);
        if with_tools {
            req = req.with_tools(vec![ToolDefinition::new("lookup", "Look something up")]);
        }
        let out = ConstrainedGeneration::new().apply(&info(support), req.clone()).unwrap();
        if passthrough {
            assert_eq!(out, req);
        } else {
            assert_eq!(injected_parts(&out.messages), 1);
            assert!(!out.output.constrained);
        }
    }

    #[test]
    fn test_unconstrained_request_untouched() {
        let req = ModelRequest::new(vec![Message::user("Hi")])
            .with_output(OutputConfig::new().with_schema(schema()));
        let out = ConstrainedGeneration::new()
            .apply(&info(ConstrainedSupport::None), req.clone())
            .unwrap();
        assert_eq!(out, req);
    }

    #[test]
    fn test_simulate_system_prompt() {
        let no_system = ModelInfo::new("t").with_supports(Supports {
            system_role: false,
            ..Supports::default()
        });
        let req = ModelRequest::new(vec![Message::system("Rules."), Message::user("Hi")]);
        let out = SimulateSystemPrompt::new().apply(&no_system, req).unwrap();
        let roles: Vec<Role> = out.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Model, Role::User]);
        assert_eq!(out.messages[0].text(), "SYSTEM INSTRUCTIONS:\nRules.");
        assert_eq!(out.messages[1].text(), "Understood.");
    }

    #[test]
    fn test_validate_support() {
        let limited = ModelInfo::new("t").with_supports(Supports {
            tools: false,
            multiturn: false,
            ..Supports::default()
        });
        let mw = ValidateSupport::new("limited");
        let tools = ModelRequest::new(vec![Message::user("Hi")])
            .with_tools(vec![ToolDefinition::new("x", "")]);
        assert!(matches!(
            mw.apply(&limited, tools),
            Err(ModelError::Unsupported { feature, .. }) if feature == "tool use"
        ));
        let history = ModelRequest::new(vec![Message::user("a"), Message::user("b")]);
        assert!(mw.apply(&limited, history).is_err());

        let media = ModelRequest::new(vec![Message::new(
            Role::User,
            vec![Part::media("https://example.com/cat.png", None)],
        )]);
        assert!(mw.apply(&ModelInfo::new("t"), media).is_err());
    }

    #[tokio::test]
    async fn test_middleware_model_applies_chain() {
        let mock = Arc::new(MockModel::new("mock").with_text_response("{}"));
        let model = MiddlewareModel::new(mock.clone()).with(ConstrainedGeneration::new());
        assert_eq!(model.middleware_names(), vec!["constrained_generation"]);

        let response = model
            .generate(&constrained_request(vec![Message::user("Hi")]), None)
            .await
            .unwrap();

        let seen = mock.recorded_requests();
        assert_eq!(seen.len(), 1);
        assert!(!seen[0].output.constrained);
        assert_eq!(injected_parts(&seen[0].messages), 1);
        assert_eq!(response.request.as_deref(), Some(&seen[0]));
    }
}
