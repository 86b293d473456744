//! The generation loop.
//!
//! One call renders the prompt, then alternates model calls and tool
//! execution until the model answers without requesting tools, tool
//! requests are handed back to the caller, or the turn limit is hit.

use flowkit_core::{Message, ModelResponseChunk, Part, ToolRequest, ToolResponse};
use flowkit_models::{
    inject_output_instructions, BoxedModel, ChunkSink, ConstrainedSupport, ModelError,
    ModelRequest, ModelResponse, Usage, PENDING_KEY,
};
use flowkit_output::FormatHandler;
use flowkit_prompt::{Prompt, PromptConfig};
use flowkit_tools::{BoxedTool, ToolError};
use futures::future::join_all;
use serde_json::Value as JsonValue;
use std::future::Future;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{GenerateError, Result};
use crate::options::{GenerateChunk, GenerateOptions, StreamCallback};
use crate::registry::Registry;
use crate::response::GenerateResponse;

/// Model invocations allowed when neither the prompt nor the call sets a limit.
pub const DEFAULT_MAX_TURNS: usize = 1;

/// Run one generation of `base` (overridden by `options`) with `input`.
pub(crate) async fn run(
    registry: &Registry,
    base: &PromptConfig,
    input: JsonValue,
    options: GenerateOptions,
) -> Result<GenerateResponse> {
    let started = Instant::now();
    let config = options.merged_over(base);
    let prompt = Prompt::with_config(config, &registry.formats)?;
    let rendered = prompt.render_value(&registry.templates, &registry.formats, input, &options.messages)?;
    if rendered.messages.is_empty() {
        return Err(GenerateError::configuration(format!(
            "'{}' rendered no messages",
            prompt.name()
        )));
    }

    let model = registry.resolve_model(rendered.model.as_deref())?;
    let tools = resolve_tools(registry, &rendered.tools)?;
    let definitions = tools.iter().map(|t| t.definition()).collect();

    let prompt_config = prompt.config();
    let mut handler = registry.formats.resolve(
        prompt_config.output_schema.as_ref(),
        prompt_config.output_format.as_deref(),
    )?;

    let mut output = rendered.output.clone();
    output.constrained = output.wants_constrained() && supports_native(&model, tools.is_empty());
    let mut messages = rendered.messages.clone();
    if !output.constrained {
        if let Some(instructions) = &rendered.output_instructions {
            if let Some(injected) = inject_output_instructions(&messages, instructions) {
                debug!(format = handler.name(), "Injected output instructions");
                messages = injected;
            }
        }
    }
    strip_pending(&mut messages);

    let mut request = rendered.to_request(definitions);
    request.output = output;
    request.messages = messages;

    let loop_state = TurnLoop {
        name: prompt.name(),
        model: &model,
        tools: &tools,
        max_turns: rendered.max_turns.unwrap_or(DEFAULT_MAX_TURNS),
        return_tool_requests: rendered.return_tool_requests.unwrap_or(false),
        stream: options.stream.as_ref(),
        token: options.cancellation.clone().unwrap_or_default(),
        started,
    };
    loop_state.run(request, &mut handler).await
}

fn resolve_tools(registry: &Registry, names: &[String]) -> Result<Vec<BoxedTool>> {
    names
        .iter()
        .map(|name| {
            registry
                .tools
                .get(name)
                .cloned()
                .ok_or_else(|| GenerateError::tool(name, ToolError::not_found(name)))
        })
        .collect()
}

fn supports_native(model: &BoxedModel, no_tools: bool) -> bool {
    match model.info().supports.constrained {
        ConstrainedSupport::None => false,
        ConstrainedSupport::NoTools => no_tools,
        ConstrainedSupport::All => true,
    }
}

/// Drop `{{section}}` placeholders nothing filled.
fn strip_pending(messages: &mut Vec<Message>) {
    let pending = |p: &Part| p.metadata_value(PENDING_KEY).and_then(JsonValue::as_bool) == Some(true);
    for message in messages.iter_mut() {
        message.content.retain(|p| !pending(p));
    }
    messages.retain(|m| !m.content.is_empty());
}

struct TurnLoop<'a> {
    name: &'a str,
    model: &'a BoxedModel,
    tools: &'a [BoxedTool],
    max_turns: usize,
    return_tool_requests: bool,
    stream: Option<&'a StreamCallback>,
    token: CancellationToken,
    started: Instant,
}

impl TurnLoop<'_> {
    async fn run(&self, mut request: ModelRequest, handler: &mut FormatHandler) -> Result<GenerateResponse> {
        let mut usage = Usage::default();
        let mut turn = 0;
        let mut next_stream = 0;

        loop {
            turn += 1;
            self.check_cancelled("before model call")?;
            info!(
                turn,
                message_count = request.messages.len(),
                model = self.model.name(),
                "Starting model turn"
            );

            let response = self.call_model(&request, handler, &mut next_stream).await?;
            usage += &response.usage;
            let sent = response.request.as_deref().cloned().unwrap_or_else(|| request.clone());
            request.messages.push(response.message.clone());

            if !response.has_tool_requests() {
                let message = handler.parse_message(&response.message)?;
                let output = handler.parse_output(&response.message)?;
                return Ok(self.finish(response, message, Some(output), sent, request.messages, usage, turn));
            }
            if self.return_tool_requests {
                let message = response.message.clone();
                return Ok(self.finish(response, message, None, sent, request.messages, usage, turn));
            }
            if turn >= self.max_turns {
                warn!(name = self.name, turns = turn, "Turn limit exceeded");
                return Err(GenerateError::MaxTurnsExceeded {
                    name: self.name.to_string(),
                    turns: turn,
                });
            }

            self.check_cancelled("before tool execution")?;
            let results = self.execute_tools(response.tool_requests()).await?;
            request.messages.extend(results);
        }
    }

    fn check_cancelled(&self, point: &str) -> Result<()> {
        if self.token.is_cancelled() {
            info!(name = self.name, point, "Generation cancelled");
            return Err(GenerateError::Cancelled);
        }
        Ok(())
    }

    /// Call the model, forwarding streamed chunks.
    ///
    /// A chunk's index is offset to `messages.len()` (or past the last
    /// stream seen, if higher) so streams never share an index across turns
    /// while separate candidates within a turn stay distinct.
    async fn call_model(
        &self,
        request: &ModelRequest,
        handler: &mut FormatHandler,
        next_stream: &mut usize,
    ) -> Result<ModelResponse> {
        let Some(callback) = self.stream else {
            return self.race(self.model.generate(request, None)).await;
        };

        let base = request.messages.len().max(*next_stream);
        let mut callback_error = None;
        let result = {
            let mut forward = |chunk: ModelResponseChunk| -> std::result::Result<(), ModelError> {
                let index = base + chunk.index;
                *next_stream = (*next_stream).max(index + 1);
                let chunk = chunk.with_index(index);
                let output = handler.parse_chunk(&chunk).unwrap_or_else(|e| {
                    debug!(error = %e, "Ignoring unparsable chunk");
                    None
                });
                callback(GenerateChunk { chunk, output }).map_err(|e| {
                    let message = e.to_string();
                    callback_error = Some(e);
                    ModelError::stream(message)
                })
            };
            let sink: &mut ChunkSink<'_> = &mut forward;
            let result = self.race(self.model.generate(request, Some(sink))).await;
            result
        };

        match (result, callback_error) {
            (Err(_), Some(e)) => Err(GenerateError::Stream(e)),
            (result, _) => result,
        }
    }

    async fn race<F>(&self, call: F) -> Result<ModelResponse>
    where
        F: Future<Output = std::result::Result<ModelResponse, ModelError>>,
    {
        tokio::select! {
            result = call => match result {
                Ok(response) => Ok(response),
                Err(ModelError::Cancelled) => Err(GenerateError::Cancelled),
                Err(e) => Err(GenerateError::Model(e)),
            },
            _ = self.token.cancelled() => {
                info!(name = self.name, "Generation cancelled during model call");
                Err(GenerateError::Cancelled)
            }
        }
    }

    /// Run every requested tool concurrently; one tool message per
    /// request, in request order.
    async fn execute_tools(&self, requests: Vec<&ToolRequest>) -> Result<Vec<Message>> {
        let calls = requests.into_iter().map(|request| {
            let tool = self.tools.iter().find(|t| t.name() == request.name).cloned();
            async move {
                let Some(tool) = tool else {
                    return Err(GenerateError::tool(&request.name, ToolError::not_found(&request.name)));
                };
                let result = tool.run_raw(request.input.clone()).await;
                debug!(tool = %request.name, success = result.is_ok(), "Executed tool");
                let output = result.map_err(|source| GenerateError::tool(&request.name, source))?;
                Ok(Message::tool(vec![Part::tool_response(ToolResponse::for_request(
                    request, output,
                ))]))
            }
        });
        join_all(calls).await.into_iter().collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        response: ModelResponse,
        message: Message,
        output: Option<JsonValue>,
        request: ModelRequest,
        mut history: Vec<Message>,
        usage: Usage,
        turns: usize,
    ) -> GenerateResponse {
        if let Some(last) = history.last_mut() {
            *last = message.clone();
        }
        GenerateResponse {
            message,
            finish_reason: response.finish_reason,
            finish_message: response.finish_message,
            usage,
            request,
            history,
            output,
            latency_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            turns,
        }
    }
}
