//! Provider trait: the wire-level abstraction over one LLM backend.
//!
//! A Provider translates a [`ProviderRequest`] into its backend's request
//! shape and translates the answer back, either whole ([`ProviderResponse`])
//! or as a lazy sequence of [`StreamFragment`]s. Tool-call reassembly and the
//! tool loop live above this layer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;
use crate::tool::ToolDescriptor;

/// One request to a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o-mini", "claude-3-5-haiku-latest")
    pub model: String,

    /// The conversation messages, system first when present
    pub messages: Vec<Message>,

    /// Sampling temperature; backend default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Tools the model may call. Empty means tool use is off for this request.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDescriptor>,

    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,

    /// Ask the backend for a JSON object answer
    #[serde(default)]
    pub json_mode: bool,
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            tools: Vec::new(),
            stream: false,
            json_mode: false,
        }
    }

    /// Whether tool definitions ride along with this request.
    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }
}

/// Why the backend stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    Other(String),
}

impl FinishReason {
    /// Map a backend's finish/stop reason string onto the shared vocabulary.
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "stop" | "end_turn" | "STOP" | "stop_sequence" => FinishReason::Stop,
            "length" | "max_tokens" | "MAX_TOKENS" => FinishReason::Length,
            "tool_calls" | "tool_use" | "function_call" => FinishReason::ToolCalls,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated assistant message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

impl ProviderResponse {
    /// True when the message carries tool calls to dispatch.
    pub fn wants_tools(&self) -> bool {
        !self.message.tool_calls.is_empty()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A piece of one tool call, tagged with the call's zero-based position in the turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    pub index: usize,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// One incremental piece of a streamed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFragment {
    /// Answer text, in order
    Content { text: String },

    /// Part of an in-progress tool call
    ToolCall(ToolCallFragment),

    /// End of the turn
    Finished {
        reason: Option<FinishReason>,
        usage: Option<Usage>,
    },
}

impl StreamFragment {
    pub fn content(text: impl Into<String>) -> Self {
        StreamFragment::Content { text: text.into() }
    }
}

/// Receiving half of a provider's fragment stream.
pub type FragmentReceiver =
    tokio::sync::mpsc::Receiver<std::result::Result<StreamFragment, ProviderError>>;

/// The core Provider trait.
///
/// Every backend family (OpenAI-compatible, Anthropic, Gemini) implements it.
/// The orchestrator calls `complete()` or `stream()` without knowing which
/// family sits behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "anthropic").
    fn name(&self) -> &str;

    /// Whether this backend accepts tool definitions at all.
    fn supports_tools(&self) -> bool {
        true
    }

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Send a request and get a stream of response fragments.
    ///
    /// Default implementation calls `complete()` and replays the result as
    /// one content fragment, one whole fragment per tool call, and a finish marker.
    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<FragmentReceiver, ProviderError> {
        let response = self.complete(request).await?;
        let calls = response.message.tool_calls.len();
        let (tx, rx) = tokio::sync::mpsc::channel(calls + 2);

        if let Some(text) = response.message.content.filter(|t| !t.is_empty()) {
            let _ = tx.send(Ok(StreamFragment::content(text))).await;
        }
        for (index, call) in response.message.tool_calls.into_iter().enumerate() {
            let fragment = ToolCallFragment {
                index,
                id: Some(call.id),
                name: Some(call.name),
                arguments: Some(call.arguments),
            };
            let _ = tx.send(Ok(StreamFragment::ToolCall(fragment))).await;
        }
        let _ = tx
            .send(Ok(StreamFragment::Finished {
                reason: response.finish_reason,
                usage: response.usage,
            }))
            .await;

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolCall;

    struct CannedProvider;

    #[async_trait]
    impl Provider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            let mut message = Message::assistant("checking");
            message.tool_calls = vec![ToolCall {
                id: "call_1".into(),
                name: "get_ticket_price".into(),
                arguments: "{}".into(),
            }];
            Ok(ProviderResponse {
                message,
                usage: None,
                model: request.model,
                finish_reason: Some(FinishReason::ToolCalls),
            })
        }
    }

    #[test]
    fn finish_reason_mapping() {
        assert_eq!(FinishReason::from_wire("tool_calls"), FinishReason::ToolCalls);
        assert_eq!(FinishReason::from_wire("tool_use"), FinishReason::ToolCalls);
        assert_eq!(FinishReason::from_wire("end_turn"), FinishReason::Stop);
        assert_eq!(FinishReason::from_wire("MAX_TOKENS"), FinishReason::Length);
        assert_eq!(
            FinishReason::from_wire("SAFETY"),
            FinishReason::Other("SAFETY".into())
        );
    }

    #[test]
    fn request_defaults() {
        let req = ProviderRequest::new("gpt-4o-mini", vec![Message::user("hi")]);
        assert!(req.temperature.is_none());
        assert!(!req.stream);
        assert!(!req.has_tools());
    }

    #[tokio::test]
    async fn default_stream_replays_complete() {
        let provider = CannedProvider;
        let mut rx = provider
            .stream(ProviderRequest::new("m", vec![]))
            .await
            .unwrap();

        let mut fragments = Vec::new();
        while let Some(fragment) = rx.recv().await {
            fragments.push(fragment.unwrap());
        }

        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0], StreamFragment::content("checking"));
        assert!(matches!(
            &fragments[1],
            StreamFragment::ToolCall(f) if f.index == 0 && f.name.as_deref() == Some("get_ticket_price")
        ));
        assert!(matches!(
            fragments[2],
            StreamFragment::Finished { reason: Some(FinishReason::ToolCalls), .. }
        ));
    }
}
