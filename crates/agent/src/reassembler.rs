//! Rebuilds one assistant turn from streamed fragments.
//!
//! Content text passes straight through. Tool calls arrive as pieces tagged
//! with a call index; each index owns an accumulator whose `id`, `name` and
//! `arguments` buffers grow by concatenation until the stream ends.

use parley_core::error::ProviderError;
use parley_core::message::ToolCall;
use parley_core::provider::{FinishReason, ProviderResponse, StreamFragment, ToolCallFragment, Usage};
use tracing::{debug, warn};

/// Highest tool-call index accepted from a stream.
pub const MAX_TOOL_CALL_INDEX: usize = 127;

#[derive(Debug, Default, Clone)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn absorb(&mut self, fragment: ToolCallFragment) {
        if let Some(id) = fragment.id {
            self.id.push_str(&id);
        }
        if let Some(name) = fragment.name {
            self.name.push_str(&name);
        }
        if let Some(arguments) = fragment.arguments {
            self.arguments.push_str(&arguments);
        }
    }
}

/// A finished assistant turn, from either a stream or a whole response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledTurn {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<Usage>,
}

impl AssembledTurn {
    pub fn from_response(response: ProviderResponse) -> Self {
        Self {
            content: response.message.content.filter(|c| !c.is_empty()),
            tool_calls: response.message.tool_calls,
            finish_reason: response.finish_reason,
            usage: response.usage,
        }
    }

    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// A turn with neither text nor tool calls means the backend gave us nothing.
    pub fn ensure_usable(&self) -> Result<(), ProviderError> {
        if self.content.is_none() && self.tool_calls.is_empty() {
            return Err(ProviderError::RequestFailed(
                "backend returned no content and no tool calls".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct StreamReassembler {
    content: String,
    calls: Vec<ToolCallAccumulator>,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
    fragments: usize,
    bad_index: Option<usize>,
}

impl StreamReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one fragment. Returns the text to show the caller, if any.
    pub fn push(&mut self, fragment: StreamFragment) -> Option<String> {
        self.fragments += 1;
        match fragment {
            StreamFragment::Content { text } => {
                if text.is_empty() {
                    return None;
                }
                self.content.push_str(&text);
                Some(text)
            }
            StreamFragment::ToolCall(fragment) => {
                if fragment.index > MAX_TOOL_CALL_INDEX {
                    warn!(index = fragment.index, "Ignoring tool call fragment with out-of-range index");
                    self.bad_index.get_or_insert(fragment.index);
                    return None;
                }
                if self.calls.len() <= fragment.index {
                    self.calls
                        .resize_with(fragment.index + 1, ToolCallAccumulator::default);
                }
                self.calls[fragment.index].absorb(fragment);
                None
            }
            StreamFragment::Finished { reason, usage } => {
                self.finish_reason = reason;
                self.usage = usage;
                None
            }
        }
    }

    /// Close the stream and hand back the turn.
    ///
    /// Index slots that never received a name are dropped. A call that never
    /// received an id gets a positional one so its result can still be bound.
    /// A tool call index above [`MAX_TOOL_CALL_INDEX`] fails the whole turn.
    pub fn finish(self) -> Result<AssembledTurn, ProviderError> {
        if self.fragments == 0 {
            return Err(ProviderError::RequestFailed(
                "stream ended without producing any fragments".into(),
            ));
        }
        if let Some(index) = self.bad_index {
            return Err(ProviderError::StreamInterrupted(format!(
                "tool call index {index} exceeds the limit of {MAX_TOOL_CALL_INDEX}"
            )));
        }

        let tool_calls: Vec<ToolCall> = self
            .calls
            .into_iter()
            .enumerate()
            .filter_map(|(index, acc)| {
                if acc.name.is_empty() {
                    warn!(index, "Dropping streamed tool call with no name");
                    return None;
                }
                let id = if acc.id.is_empty() {
                    format!("call_{index}")
                } else {
                    acc.id
                };
                Some(ToolCall {
                    id,
                    name: acc.name,
                    arguments: acc.arguments,
                })
            })
            .collect();

        debug!(
            fragments = self.fragments,
            content_len = self.content.len(),
            tool_calls = tool_calls.len(),
            "Stream reassembled"
        );

        let turn = AssembledTurn {
            content: (!self.content.is_empty()).then_some(self.content),
            tool_calls,
            finish_reason: self.finish_reason,
            usage: self.usage,
        };
        turn.ensure_usable()?;
        Ok(turn)
    }
}
