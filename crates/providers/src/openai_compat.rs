//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Groq, DeepSeek and any other
//! endpoint exposing `/chat/completions`.
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE)
//! - Tool use / function calling, streamed as indexed fragments
//! - JSON-object response format

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parley_core::error::ProviderError;
use parley_core::message::{Message, Role, ToolCall};
use parley_core::provider::*;
use parley_core::tool::ToolDescriptor;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::http::{build_client, error_for_status, network_error};
use crate::sse::{SseDecoder, SseLine};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client: build_client(Duration::from_secs(120))?,
        })
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openai", OPENAI_BASE_URL, Some(api_key.into()))
    }

    /// Create an Ollama provider (convenience constructor). No key needed.
    pub fn ollama(base_url: Option<&str>) -> Result<Self, ProviderError> {
        Self::new("ollama", base_url.unwrap_or("http://localhost:11434/v1"), None)
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.to_string(),
                content: m.content.clone(),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
                name: if m.role == Role::Tool { m.name.clone() } else { None },
            })
            .collect()
    }

    fn to_api_tools(tools: &[ToolDescriptor]) -> Vec<serde_json::Value> {
        tools.iter().map(ToolDescriptor::to_wire).collect()
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "stream": stream,
        });

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if request.has_tools() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }
        if request.json_mode {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        body
    }

    async fn post(
        &self,
        request: &ProviderRequest,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(request, stream);

        debug!(
            provider = %self.name,
            model = %request.model,
            stream,
            tools = request.tools.len(),
            "Sending chat completion request"
        );

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder.send().await.map_err(network_error)?;
        if !response.status().is_success() {
            return Err(error_for_status(&self.name, response, request.has_tools()).await);
        }
        Ok(response)
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let response = self.post(&request, false).await?;

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        response_to_provider_response(api_response)
    }

    async fn stream(&self, request: ProviderRequest) -> Result<FragmentReceiver, ProviderError> {
        let response = self.post(&request, true).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Spawn task to read the SSE byte stream and forward fragments
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut decoder = SseDecoder::new();
            let mut finish: Option<FinishReason> = None;
            let mut usage: Option<Usage> = None;

            let mut ended = false;
            'read: while !ended {
                let lines = match byte_stream.next().await {
                    Some(Ok(bytes)) => decoder.push(&bytes),
                    Some(Err(e)) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                    // the body may end on a line with no trailing newline
                    None => {
                        ended = true;
                        decoder.finish().into_iter().collect()
                    }
                };

                for line in lines {
                    let SseLine::Data(data) = line else { continue };

                    // "[DONE]" signals end of stream
                    if data == "[DONE]" {
                        break 'read;
                    }

                    match serde_json::from_str::<StreamResponse>(&data) {
                        Ok(chunk) => {
                            for fragment in chunk_fragments(chunk, &mut finish, &mut usage) {
                                if tx.send(Ok(fragment)).await.is_err() {
                                    return; // receiver dropped
                                }
                            }
                        }
                        Err(e) => {
                            trace!(
                                provider = %provider_name,
                                data = %data,
                                error = %e,
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                    }
                }
            }

            let _ = tx
                .send(Ok(StreamFragment::Finished {
                    reason: finish,
                    usage,
                }))
                .await;
        });

        Ok(rx)
    }
}

fn response_to_provider_response(api_response: ApiResponse) -> Result<ProviderResponse, ProviderError> {
    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::RequestFailed("no choices in response".into()))?;

    let tool_calls: Vec<ToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall {
            id: tc.id,
            name: tc.function.name,
            arguments: tc.function.arguments,
        })
        .collect();

    let mut message = Message::assistant_tool_calls(choice.message.content, tool_calls);
    if message.tool_calls.is_empty() && message.content.is_none() {
        message.content = Some(String::new());
    }

    let usage = api_response.usage.map(|u| Usage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    Ok(ProviderResponse {
        message,
        usage,
        model: api_response.model,
        finish_reason: choice.finish_reason.as_deref().map(FinishReason::from_wire),
    })
}

/// Translate one SSE chunk into fragments, remembering finish reason and usage
/// for the closing [`StreamFragment::Finished`].
fn chunk_fragments(
    chunk: StreamResponse,
    finish: &mut Option<FinishReason>,
    usage: &mut Option<Usage>,
) -> Vec<StreamFragment> {
    let mut fragments = Vec::new();

    if let Some(u) = chunk.usage {
        *usage = Some(Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return fragments;
    };

    if let Some(text) = choice.delta.content.filter(|c| !c.is_empty()) {
        fragments.push(StreamFragment::content(text));
    }

    for delta in choice.delta.tool_calls.unwrap_or_default() {
        let (name, arguments) = match delta.function {
            Some(f) => (f.name, f.arguments),
            None => (None, None),
        };
        fragments.push(StreamFragment::ToolCall(ToolCallFragment {
            index: delta.index,
            id: delta.id,
            name,
            arguments,
        }));
    }

    if let Some(reason) = choice.finish_reason {
        *finish = Some(FinishReason::from_wire(&reason));
    }

    fragments
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta: arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments_of(data: &str) -> (Vec<StreamFragment>, Option<FinishReason>, Option<Usage>) {
        let chunk: StreamResponse = serde_json::from_str(data).unwrap();
        let mut finish = None;
        let mut usage = None;
        let fragments = chunk_fragments(chunk, &mut finish, &mut usage);
        (fragments, finish, usage)
    }

    #[test]
    fn ollama_constructor() {
        let provider = OpenAiCompatProvider::ollama(None).unwrap();
        assert_eq!(provider.name(), "ollama");
        assert!(provider.base_url.contains("localhost:11434"));
        assert!(provider.api_key.is_none());
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are helpful"), Message::user("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn message_conversion_with_tool_calls() {
        let msg = Message::assistant_tool_calls(
            None,
            vec![ToolCall {
                id: "call_1".into(),
                name: "get_ticket_price".into(),
                arguments: r#"{"destination_city":"Paris"}"#.into(),
            }],
        );
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[msg]);
        let json = serde_json::to_value(&api_msgs[0]).unwrap();
        assert_eq!(json["content"], serde_json::Value::Null);
        assert_eq!(json["tool_calls"][0]["type"], "function");
        assert_eq!(json["tool_calls"][0]["function"]["name"], "get_ticket_price");
    }

    #[test]
    fn message_conversion_tool_response() {
        let msg = Message::tool_result("call_1", "get_ticket_price", "$899");
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[msg]);
        assert_eq!(api_msgs[0].role, "tool");
        assert_eq!(api_msgs[0].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(api_msgs[0].name.as_deref(), Some("get_ticket_price"));
    }

    #[test]
    fn request_body_flags() {
        let mut request = ProviderRequest::new("gpt-4o-mini", vec![Message::user("hi")]);
        request.json_mode = true;
        request.temperature = Some(0.2);
        request.tools = vec![ToolDescriptor::new(
            "get_ticket_price",
            "price",
            serde_json::json!({"type": "object", "properties": {}}),
        )];

        let body = OpenAiCompatProvider::request_body(&request, true);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["tools"][0]["function"]["name"], "get_ticket_price");
        assert!(body.get("max_tokens").is_none());

        let plain = OpenAiCompatProvider::request_body(
            &ProviderRequest::new("gpt-4o-mini", vec![]),
            false,
        );
        assert!(plain.get("tools").is_none());
        assert!(plain.get("temperature").is_none());
        assert!(plain.get("response_format").is_none());
    }

    #[test]
    fn no_choices_is_request_failure() {
        let api: ApiResponse = serde_json::from_str(r#"{"model":"m","choices":[]}"#).unwrap();
        let err = response_to_provider_response(api).unwrap_err();
        assert!(matches!(err, ProviderError::RequestFailed(_)));
    }

    #[test]
    fn complete_response_with_tool_calls() {
        let data = r#"{
            "model": "gpt-4o-mini",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{"id": "call_1", "type": "function",
                        "function": {"name": "get_ticket_price", "arguments": "{\"destination_city\":\"Paris\"}"}}]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let api: ApiResponse = serde_json::from_str(data).unwrap();
        let response = response_to_provider_response(api).unwrap();
        assert!(response.wants_tools());
        assert_eq!(response.finish_reason, Some(FinishReason::ToolCalls));
        assert_eq!(response.message.tool_calls[0].id, "call_1");
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    // --- SSE parsing tests ---

    #[test]
    fn stream_content_delta() {
        let (fragments, finish, _) =
            fragments_of(r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#);
        assert_eq!(fragments, vec![StreamFragment::content("Hello")]);
        assert!(finish.is_none());
    }

    #[test]
    fn stream_finish_chunk() {
        let (fragments, finish, _) =
            fragments_of(r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#);
        assert!(fragments.is_empty());
        assert_eq!(finish, Some(FinishReason::ToolCalls));
    }

    #[test]
    fn stream_tool_call_deltas_are_forwarded_raw() {
        let (first, _, _) = fragments_of(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_abc","function":{"name":"get_ticket_price","arguments":""}}]},"finish_reason":null}]}"#,
        );
        let (second, _, _) = fragments_of(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"destination_city\""}}]},"finish_reason":null}]}"#,
        );

        assert_eq!(
            first,
            vec![StreamFragment::ToolCall(ToolCallFragment {
                index: 0,
                id: Some("call_abc".into()),
                name: Some("get_ticket_price".into()),
                arguments: Some(String::new()),
            })]
        );
        assert_eq!(
            second,
            vec![StreamFragment::ToolCall(ToolCallFragment {
                index: 0,
                id: None,
                name: None,
                arguments: Some("{\"destination_city\"".into()),
            })]
        );
    }

    #[test]
    fn stream_parallel_tool_calls_keep_index() {
        let (fragments, _, _) = fragments_of(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","function":{"name":"search","arguments":""}},{"index":1,"id":"call_b","function":{"name":"calc","arguments":""}}]},"finish_reason":null}]}"#,
        );
        let indices: Vec<usize> = fragments
            .iter()
            .filter_map(|f| match f {
                StreamFragment::ToolCall(tc) => Some(tc.index),
                _ => None,
            })
            .collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn stream_usage_chunk() {
        let (fragments, _, usage) = fragments_of(
            r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
        );
        assert!(fragments.is_empty());
        assert_eq!(usage.unwrap().completion_tokens, 5);
    }
}
