//! OpenAI-compatible chat completions backend (LiteLLM proxy and friends).

use super::sse::SseDecoder;
use crate::model::{
    Backend, DeltaSink, Message, ModelError, ModelRequest, ModelResponse, Part, Role, ToolCall,
    ToolSpec, Usage,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// LiteLLM proxy default listen address.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:4000";

// Routing prefix understood by the LiteLLM SDK; the proxy itself wants the bare name.
const PROXY_PREFIX: &str = "litellm_proxy/";

const DONE_SENTINEL: &str = "[DONE]";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<ApiStreamOptions>,
}

#[derive(Debug, Serialize)]
struct ApiStreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum ApiMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ApiToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
struct ApiToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: ApiFunctionCall,
}

#[derive(Debug, Serialize)]
struct ApiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ApiFunction<'a>,
}

#[derive(Debug, Serialize)]
struct ApiFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ApiChunk {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    delta: Option<ApiDelta>,
}

#[derive(Debug, Deserialize)]
struct ApiDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCallDelta {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<ApiFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct ApiFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Stream Assembly
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

/// Folds streamed chunks into one assistant message.
#[derive(Debug, Default)]
struct StreamState {
    text: String,
    calls: BTreeMap<usize, PendingCall>,
    usage: Usage,
    done: bool,
}

impl StreamState {
    fn apply(&mut self, payload: &str, on_delta: DeltaSink<'_>) -> Result<(), ModelError> {
        if self.done {
            return Ok(());
        }
        if payload.trim() == DONE_SENTINEL {
            self.done = true;
            return Ok(());
        }

        let chunk: ApiChunk = serde_json::from_str(payload)
            .map_err(|e| ModelError::InvalidResponse(format!("{e}: {payload}")))?;

        if let Some(error) = chunk.error {
            return Err(ModelError::Api(error.to_string()));
        }
        if let Some(usage) = chunk.usage {
            self.usage = Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            };
        }

        for delta in chunk.choices.into_iter().filter_map(|c| c.delta) {
            if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
                on_delta(&text);
                self.text.push_str(&text);
            }
            for call in delta.tool_calls.unwrap_or_default() {
                let pending = self.calls.entry(call.index).or_default();
                if let Some(id) = call.id.filter(|id| !id.is_empty()) {
                    pending.id = id;
                }
                if let Some(function) = call.function {
                    if let Some(name) = function.name.filter(|_| pending.name.is_empty()) {
                        pending.name = name;
                    }
                    if let Some(arguments) = function.arguments {
                        pending.arguments.push_str(&arguments);
                    }
                }
            }
        }
        Ok(())
    }

    fn into_response(self) -> ModelResponse {
        let mut parts = Vec::new();
        if !self.text.is_empty() {
            parts.push(Part::Text(self.text));
        }
        for (index, call) in self.calls {
            let id = if call.id.is_empty() {
                format!("call_{index}")
            } else {
                call.id
            };
            parts.push(Part::ToolCall(ToolCall {
                id,
                name: call.name,
                input: parse_arguments(&call.arguments),
            }));
        }

        ModelResponse {
            message: Message {
                role: Role::Assistant,
                parts,
            },
            usage: self.usage,
        }
    }
}

/// Empty arguments mean "no arguments"; unparsable ones are passed through
/// as a string so the tool host can report them as invalid input.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating a chat completions backend.
#[derive(Debug, Clone)]
pub struct ChatCompletionsBackendBuilder {
    model: String,
    base_url: Option<String>,
    api_key: Option<String>,
    max_tokens: Option<u32>,
    drop_params: bool,
}

impl ChatCompletionsBackendBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: None,
            api_key: None,
            max_tokens: None,
            drop_params: true,
        }
    }

    /// Override the API base (defaults to [`DEFAULT_BASE_URL`]).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Omit optional request parameters some providers reject.
    pub fn drop_params(mut self, drop_params: bool) -> Self {
        self.drop_params = drop_params;
        self
    }

    pub fn build(self) -> ChatCompletionsBackend {
        let base = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        ChatCompletionsBackend {
            client: reqwest::Client::new(),
            endpoint: format!("{}/chat/completions", base.trim_end_matches('/')),
            model: self.model,
            api_key: self.api_key,
            max_tokens: self.max_tokens,
            drop_params: self.drop_params,
        }
    }
}

/// Streaming OpenAI-compatible chat completions backend.
pub struct ChatCompletionsBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_tokens: Option<u32>,
    drop_params: bool,
}

impl ChatCompletionsBackend {
    pub fn builder(model: impl Into<String>) -> ChatCompletionsBackendBuilder {
        ChatCompletionsBackendBuilder::new(model)
    }

    fn wire_model(&self) -> &str {
        self.model.strip_prefix(PROXY_PREFIX).unwrap_or(&self.model)
    }

    fn message_to_api(msg: &Message, out: &mut Vec<ApiMessage>) {
        match msg.role {
            Role::Assistant => {
                let text = msg.text();
                let tool_calls = msg
                    .tool_calls()
                    .into_iter()
                    .map(|call| ApiToolCall {
                        id: call.id,
                        kind: "function",
                        function: ApiFunctionCall {
                            name: call.name,
                            arguments: call.input.to_string(),
                        },
                    })
                    .collect();
                out.push(ApiMessage::Assistant {
                    content: (!text.is_empty()).then_some(text),
                    tool_calls,
                });
            }
            Role::User => {
                let text = msg.text();
                if !text.is_empty() {
                    out.push(ApiMessage::User { content: text });
                }
                out.extend(msg.parts.iter().filter_map(|part| match part {
                    Part::ToolResult(result) => Some(ApiMessage::Tool {
                        tool_call_id: result.tool_call_id().to_string(),
                        content: result.content(),
                    }),
                    _ => None,
                }));
            }
        }
    }

    fn tool_to_api(spec: &ToolSpec) -> ApiTool<'_> {
        ApiTool {
            kind: "function",
            function: ApiFunction {
                name: &spec.name,
                description: &spec.description,
                parameters: &spec.schema,
            },
        }
    }

    fn build_request<'a>(&'a self, request: &ModelRequest<'a>) -> ApiRequest<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system.filter(|s| !s.is_empty()) {
            messages.push(ApiMessage::System {
                content: system.to_string(),
            });
        }
        for msg in request.messages {
            Self::message_to_api(msg, &mut messages);
        }

        ApiRequest {
            model: self.wire_model(),
            messages,
            tools: request.tools.iter().map(Self::tool_to_api).collect(),
            stream: true,
            max_tokens: self.max_tokens,
            stream_options: (!self.drop_params).then_some(ApiStreamOptions {
                include_usage: true,
            }),
        }
    }
}

impl std::fmt::Display for ChatCompletionsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "chat-completions({} @ {})", self.model, self.endpoint)
    }
}

impl Backend for ChatCompletionsBackend {
    async fn call(
        &self,
        request: ModelRequest<'_>,
        on_delta: DeltaSink<'_>,
    ) -> Result<ModelResponse, ModelError> {
        let body = self.build_request(&request);
        debug!(
            model = body.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "sending chat completion request"
        );

        let mut req = self
            .client
            .post(&self.endpoint)
            .header("accept", "text/event-stream")
            .json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("{status}: {body}")));
        }

        let mut decoder = SseDecoder::new();
        let mut state = StreamState::default();
        let mut bytes = response.bytes_stream();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| ModelError::Network(e.to_string()))?;
            for payload in decoder.push(&chunk) {
                state.apply(&payload, on_delta)?;
            }
            if state.done {
                break;
            }
        }
        for payload in decoder.finish() {
            state.apply(&payload, on_delta)?;
        }

        let response = state.into_response();
        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            tool_calls = response.message.tool_calls().len(),
            "chat completion finished"
        );
        Ok(response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
