//! Shared test doubles for adapter, orchestrator and battle tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use parley_core::error::ProviderError;
use parley_core::message::{Message, ToolCall};
use parley_core::provider::{
    FinishReason, FragmentReceiver, Provider, ProviderRequest, ProviderResponse, StreamFragment,
    Usage,
};

enum Step {
    Reply(ProviderResponse),
    Stream(Vec<StreamFragment>),
    Fail(ProviderError),
}

/// A provider that plays back a script and records every request.
///
/// Once the script runs out it answers `"{label} reply {n}"`, counting its
/// own calls from 1.
pub struct ScriptedProvider {
    label: String,
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ProviderRequest>>,
    tools: bool,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            label: "mock".into(),
            script: Mutex::new(responses.into_iter().map(Step::Reply).collect()),
            requests: Mutex::new(Vec::new()),
            tools: true,
        }
    }

    /// An unscripted provider whose answers carry `label`.
    pub fn answering(label: &str) -> Self {
        Self {
            label: label.into(),
            ..Self::new(vec![])
        }
    }

    pub fn without_tool_support(mut self) -> Self {
        self.tools = false;
        self
    }

    pub fn push_stream(&self, fragments: Vec<StreamFragment>) {
        self.script.lock().unwrap().push_back(Step::Stream(fragments));
    }

    pub fn push_error(&self, error: ProviderError) {
        self.script.lock().unwrap().push_back(Step::Fail(error));
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_step(&self, request: ProviderRequest) -> Step {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request);
        let n = requests.len();
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Step::Reply(text_reply(&format!("{} reply {n}", self.label))))
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn supports_tools(&self) -> bool {
        self.tools
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match self.next_step(request) {
            Step::Reply(response) => Ok(response),
            Step::Fail(error) => Err(error),
            Step::Stream(_) => panic!("ScriptedProvider: stream step reached complete()"),
        }
    }

    async fn stream(&self, request: ProviderRequest) -> Result<FragmentReceiver, ProviderError> {
        let fragments = match self.next_step(request) {
            Step::Stream(fragments) => fragments,
            Step::Fail(error) => return Err(error),
            Step::Reply(response) => {
                let mut fragments = Vec::new();
                if let Some(text) = response.message.content.filter(|t| !t.is_empty()) {
                    fragments.push(StreamFragment::content(text));
                }
                fragments.push(StreamFragment::Finished {
                    reason: response.finish_reason,
                    usage: response.usage,
                });
                fragments
            }
        };

        let (tx, rx) = tokio::sync::mpsc::channel(fragments.len().max(1));
        for fragment in fragments {
            let _ = tx.send(Ok(fragment)).await;
        }
        Ok(rx)
    }
}

/// Rejects every request that carries tools; answers anything else.
pub struct ToolRejectingProvider {
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ToolRejectingProvider {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ToolRejectingProvider {
    fn name(&self) -> &str {
        "tool_rejecting"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let has_tools = request.has_tools();
        self.requests.lock().unwrap().push(request);
        if has_tools {
            return Err(ProviderError::ToolsRejected("tools are not supported".into()));
        }
        Ok(text_reply("plain answer"))
    }
}

pub fn text_reply(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
        finish_reason: Some(FinishReason::Stop),
    }
}

pub fn tool_reply(tool_calls: Vec<ToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_tool_calls(None, tool_calls),
        usage: None,
        model: "mock-model".into(),
        finish_reason: Some(FinishReason::ToolCalls),
    }
}
