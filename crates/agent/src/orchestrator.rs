//! The tool loop.
//!
//! One exchange runs `Requesting -> {Done, ToolPending}`,
//! `ToolPending -> Executing -> Requesting` until the model answers in text.
//! The assistant tool-call record is appended before its results, so every
//! tool message follows the call it answers.

use futures::stream::BoxStream;
use parley_core::context::{ContextProvider, with_context};
use parley_core::conversation::Conversation;
use parley_core::error::{ProviderError, Result};
use parley_core::message::{Message, Role};
use parley_core::provider::{FragmentReceiver, Provider, ProviderRequest, ProviderResponse};
use parley_core::tool::ToolRegistry;
use tracing::{debug, info, warn};

use crate::adapter::{AdapterSettings, RequestOptions};
use crate::reassembler::{AssembledTurn, StreamReassembler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExchangeState {
    Requesting,
    ToolPending,
    Executing,
    Done,
}

/// Where an exchange records its turns.
pub(crate) enum Transcript<'a> {
    /// Throwaway history for a one-shot request.
    Scratch(Conversation),
    /// The adapter's own conversation.
    Session(&'a mut Conversation),
}

impl Transcript<'_> {
    fn get(&self) -> &Conversation {
        match self {
            Transcript::Scratch(c) => c,
            Transcript::Session(c) => c,
        }
    }

    fn get_mut(&mut self) -> &mut Conversation {
        match self {
            Transcript::Scratch(c) => c,
            Transcript::Session(c) => c,
        }
    }
}

enum Reply {
    Whole(ProviderResponse),
    Fragments(FragmentReceiver),
}

async fn send(provider: &dyn Provider, request: &ProviderRequest) -> std::result::Result<Reply, ProviderError> {
    if request.stream {
        provider.stream(request.clone()).await.map(Reply::Fragments)
    } else {
        provider.complete(request.clone()).await.map(Reply::Whole)
    }
}

/// The transcript as sent: `system`, when set, takes the place of the
/// leading system message (or is prepended when there is none).
fn outbound_messages(conversation: &Conversation, system: Option<&str>) -> Vec<Message> {
    let messages = conversation.messages();
    let Some(system) = system else {
        return messages.to_vec();
    };

    let rest = match messages.first() {
        Some(first) if first.role == Role::System => &messages[1..],
        _ => messages,
    };
    let mut out = Vec::with_capacity(rest.len() + 1);
    if !system.is_empty() {
        out.push(Message::system(system));
    }
    out.extend_from_slice(rest);
    out
}

/// Everything one exchange borrows from its adapter.
pub(crate) struct Exchange<'a> {
    pub provider: &'a dyn Provider,
    pub registry: &'a ToolRegistry,
    pub settings: &'a AdapterSettings,
    pub tools_disabled: &'a mut bool,
    pub transcript: Transcript<'a>,
    /// Outbound system text overriding the transcript's own.
    pub system: Option<String>,
    pub context: Option<&'a dyn ContextProvider>,
    pub options: RequestOptions,
}

impl<'a> Exchange<'a> {
    pub(crate) fn run(self) -> BoxStream<'a, Result<String>> {
        let Exchange {
            provider,
            registry,
            settings,
            tools_disabled,
            mut transcript,
            mut system,
            context,
            options,
        } = self;

        Box::pin(async_stream::try_stream! {
            if let Some(context) = context {
                let query = transcript.get().last_user_text().unwrap_or("").to_string();
                let extra = context.get_context(&query).await;
                if !extra.trim().is_empty() {
                    let base = system
                        .clone()
                        .or_else(|| transcript.get().persona().map(String::from))
                        .unwrap_or_default();
                    system = Some(with_context(&base, &extra));
                }
            }

            let mut state = ExchangeState::Requesting;
            let mut turn = AssembledTurn::default();
            let mut rounds = 0usize;

            while state != ExchangeState::Done {
                debug!(?state, rounds, provider = provider.name(), "Exchange step");

                match state {
                    ExchangeState::Requesting => {
                        let attach = options.tools
                            && !*tools_disabled
                            && provider.supports_tools()
                            && !registry.is_empty()
                            && rounds < settings.max_tool_rounds;

                        let mut request = ProviderRequest::new(
                            settings.model.clone(),
                            outbound_messages(transcript.get(), system.as_deref()),
                        );
                        request.temperature = settings.temperature;
                        request.max_tokens = settings.max_tokens;
                        request.stream = options.stream;
                        request.json_mode = options.json;
                        if attach {
                            request.tools = registry.descriptors();
                        }

                        let reply = match send(provider, &request).await {
                            Err(ProviderError::ToolsRejected(reason)) if attach => {
                                warn!(
                                    provider = provider.name(),
                                    %reason,
                                    "Backend rejected tool definitions, disabling tools for this adapter"
                                );
                                *tools_disabled = true;
                                request.tools.clear();
                                send(provider, &request).await.map_err(|e| {
                                    ProviderError::RequestFailed(format!("retry without tools failed: {e}"))
                                })
                            }
                            other => other,
                        }?;

                        turn = match reply {
                            Reply::Whole(response) => {
                                let whole = AssembledTurn::from_response(response);
                                whole.ensure_usable()?;
                                if !whole.wants_tools() {
                                    if let Some(text) = whole.content.clone() {
                                        yield text;
                                    }
                                }
                                whole
                            }
                            Reply::Fragments(mut rx) => {
                                let mut reassembler = StreamReassembler::new();
                                while let Some(item) = rx.recv().await {
                                    if let Some(text) = reassembler.push(item?) {
                                        yield text;
                                    }
                                }
                                reassembler.finish()?
                            }
                        };

                        state = if turn.wants_tools() {
                            ExchangeState::ToolPending
                        } else {
                            ExchangeState::Done
                        };
                    }
                    ExchangeState::ToolPending => {
                        // streamed preamble text already went to the caller and
                        // ends up in the answer it records, so keep it out of here
                        let preamble = turn.content.take().filter(|_| !options.stream);
                        transcript
                            .get_mut()
                            .append_tool_calls(preamble, turn.tool_calls.clone());
                        state = ExchangeState::Executing;
                    }
                    ExchangeState::Executing => {
                        for call in std::mem::take(&mut turn.tool_calls) {
                            info!(tool = %call.name, call_id = %call.id, "Dispatching tool call");
                            let output = registry.dispatch_call(&call).await;
                            transcript
                                .get_mut()
                                .append_tool_result(call.id, call.name, output)?;
                        }
                        rounds += 1;
                        state = ExchangeState::Requesting;
                    }
                    ExchangeState::Done => {}
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_override_replaces_leading_system() {
        let mut conversation = Conversation::with_persona("persona");
        conversation.append_user("hi");

        let out = outbound_messages(&conversation, Some("persona\n\nfacts"));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text(), "persona\n\nfacts");

        let untouched = outbound_messages(&conversation, None);
        assert_eq!(untouched, conversation.messages());
    }

    #[test]
    fn outbound_override_prepends_when_missing() {
        let mut conversation = Conversation::new();
        conversation.append_user("hi");

        let out = outbound_messages(&conversation, Some("persona"));
        assert_eq!(out[0].role, Role::System);
        assert_eq!(out[1].text(), "hi");
        // the conversation itself is untouched
        assert_eq!(conversation.len(), 1);
    }
}
