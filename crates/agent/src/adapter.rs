//! Provider adapter: the uniform facade over one configured backend.
//!
//! Every backend family is driven through the same four operations:
//! [`ProviderAdapter::make_request`], [`ProviderAdapter::make_assistant_request`],
//! [`ProviderAdapter::update_messages`] and [`ProviderAdapter::identity`].
//! The family-specific translation lives behind the [`Provider`] it wraps.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use parley_config::{BackendFamily, ProfileConfig};
use parley_core::context::ContextProvider;
use parley_core::conversation::Conversation;
use parley_core::error::Result;
use parley_core::message::Message;
use parley_core::provider::Provider;
use parley_core::tool::ToolRegistry;
use tracing::debug;

use crate::orchestrator::{Exchange, Transcript};

const DEFAULT_MAX_TOOL_ROUNDS: usize = 10;

/// What a request asks of the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Ask for a JSON object answer
    pub json: bool,
    /// Stream the answer as it is generated
    pub stream: bool,
    /// Offer the registered tools
    pub tools: bool,
}

impl RequestOptions {
    pub fn streaming() -> Self {
        Self {
            stream: true,
            ..Self::default()
        }
    }

    pub fn with_tools(mut self, tools: bool) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

/// The read-only profile values an adapter sends with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterSettings {
    pub model: String,
    pub persona: String,
    pub default_request: String,
    /// Characters kept from one-shot user text; `<= 0` keeps everything.
    pub request_char_limit: i64,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub max_tool_rounds: usize,
}

impl AdapterSettings {
    pub fn new(model: impl Into<String>, persona: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            persona: persona.into(),
            default_request: String::new(),
            request_char_limit: 0,
            temperature: None,
            max_tokens: None,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn from_profile(profile: &ProfileConfig) -> Self {
        let base = profile.base();
        Self {
            model: base.model.clone(),
            persona: base.tone.clone(),
            default_request: base.request.clone(),
            request_char_limit: base.request_char_limit,
            temperature: profile.temperature(),
            max_tokens: profile.max_tokens(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    fn truncate(&self, text: &str) -> String {
        match usize::try_from(self.request_char_limit) {
            Ok(limit) if limit > 0 => text.chars().take(limit).collect(),
            _ => text.to_string(),
        }
    }
}

/// Changes to apply to an adapter's conversation, in field order:
/// `history` replaces, then `assistant` and `user` append.
#[derive(Debug, Clone, Default)]
pub struct MessageUpdate {
    pub history: Option<Vec<Message>>,
    pub assistant: Option<String>,
    pub user: Option<String>,
}

impl MessageUpdate {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            user: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            assistant: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn history(messages: Vec<Message>) -> Self {
        Self {
            history: Some(messages),
            ..Self::default()
        }
    }

    pub fn and_user(mut self, text: impl Into<String>) -> Self {
        self.user = Some(text.into());
        self
    }
}

pub struct ProviderAdapter {
    family: BackendFamily,
    provider: Arc<dyn Provider>,
    settings: AdapterSettings,
    conversation: Conversation,
    tools: Arc<ToolRegistry>,
    context: Option<Arc<dyn ContextProvider>>,
    tools_disabled: bool,
}

impl ProviderAdapter {
    pub fn new(
        family: BackendFamily,
        provider: Arc<dyn Provider>,
        settings: AdapterSettings,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let conversation = Conversation::with_persona(&settings.persona);
        Self {
            family,
            provider,
            settings,
            conversation,
            tools,
            context: None,
            tools_disabled: false,
        }
    }

    /// Build the transport a profile names and wrap it.
    pub fn from_profile(profile: &ProfileConfig, tools: Arc<ToolRegistry>) -> Result<Self> {
        let provider = parley_providers::build_provider(profile)?;
        Ok(Self::new(
            profile.family(),
            provider,
            AdapterSettings::from_profile(profile),
            tools,
        ))
    }

    pub fn with_context(mut self, context: Arc<dyn ContextProvider>) -> Self {
        self.context = Some(context);
        self
    }

    /// Replace the persona and restart the conversation with it.
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.settings.persona = persona.into();
        self.conversation.reset(Some(&self.settings.persona), None);
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.settings.max_tool_rounds = rounds;
        self
    }

    /// `{family}-{model}`, e.g. `openai-gpt-4o-mini`.
    pub fn identity(&self) -> String {
        format!("{}-{}", self.family, self.settings.model)
    }

    pub fn family(&self) -> BackendFamily {
        self.family
    }

    pub fn settings(&self) -> &AdapterSettings {
        &self.settings
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Whether a backend rejection has switched tool attachment off for good.
    pub fn tools_disabled(&self) -> bool {
        self.tools_disabled
    }

    pub fn update_messages(&mut self, update: MessageUpdate) {
        if let Some(history) = update.history {
            self.conversation.replace_history(history);
        }
        if let Some(text) = update.assistant {
            self.conversation.append_assistant(text);
        }
        if let Some(text) = update.user {
            self.conversation.append_user(text);
        }
    }

    /// Clear the conversation back to the persona, optionally followed by a seed user turn.
    pub fn reset_conversation(&mut self, seed_request: Option<&str>) {
        self.conversation
            .reset(Some(&self.settings.persona), seed_request);
    }

    /// One-shot request on a scratch history of persona plus user text.
    ///
    /// An empty `system_message` keeps the profile persona; an empty
    /// `request` falls back to the profile's default request. The adapter's
    /// own conversation is not touched.
    pub fn make_request(
        &mut self,
        system_message: &str,
        request: &str,
        options: RequestOptions,
    ) -> BoxStream<'_, Result<String>> {
        let system = if system_message.is_empty() {
            self.settings.persona.as_str()
        } else {
            system_message
        };
        let request = if request.is_empty() {
            self.settings.default_request.as_str()
        } else {
            request
        };
        let request = self.settings.truncate(request);

        debug!(identity = %self.identity(), chars = request.chars().count(), "One-shot request");

        let mut scratch = Conversation::new();
        scratch.reset(Some(system), Some(&request));

        Exchange {
            provider: self.provider.as_ref(),
            registry: self.tools.as_ref(),
            settings: &self.settings,
            tools_disabled: &mut self.tools_disabled,
            transcript: Transcript::Scratch(scratch),
            system: None,
            context: self.context.as_deref(),
            options,
        }
        .run()
    }

    /// Continue the adapter's own conversation.
    ///
    /// Tool-call records and tool results land in the conversation; the final
    /// answer does not, the caller records it with [`MessageUpdate::assistant`].
    /// When streaming, text that precedes a tool call is part of the yielded
    /// answer and is left off the tool-call record.
    pub fn make_assistant_request(&mut self, options: RequestOptions) -> BoxStream<'_, Result<String>> {
        // replaced histories may lack a system message; send the persona anyway
        let system = match self.conversation.persona() {
            Some(_) => None,
            None if self.settings.persona.is_empty() => None,
            None => Some(self.settings.persona.clone()),
        };

        debug!(
            identity = %self.identity(),
            messages = self.conversation.len(),
            "Assistant request"
        );

        Exchange {
            provider: self.provider.as_ref(),
            registry: self.tools.as_ref(),
            settings: &self.settings,
            tools_disabled: &mut self.tools_disabled,
            transcript: Transcript::Session(&mut self.conversation),
            system,
            context: self.context.as_deref(),
            options,
        }
        .run()
    }
}

/// Drain a chunk stream into one string.
pub async fn collect_text(mut stream: BoxStream<'_, Result<String>>) -> Result<String> {
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        text.push_str(&chunk?);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, ToolRejectingProvider, text_reply, tool_reply};
    use async_trait::async_trait;
    use parley_core::error::{Error, ProviderError};
    use parley_core::message::{Role, ToolCall};
    use parley_core::provider::{StreamFragment, ToolCallFragment};
    use parley_tools::TicketPriceTool;

    fn ticket_registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(TicketPriceTool));
        Arc::new(registry)
    }

    fn adapter(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>) -> ProviderAdapter {
        ProviderAdapter::new(
            BackendFamily::OpenAi,
            provider,
            AdapterSettings::new("mock-model", "You are a helpful travel agent."),
            tools,
        )
    }

    fn paris_call() -> ToolCall {
        ToolCall {
            id: "call_paris".into(),
            name: "get_ticket_price".into(),
            arguments: r#"{"destination_city":"Paris"}"#.into(),
        }
    }

    struct FixedContext(&'static str);

    #[async_trait]
    impl ContextProvider for FixedContext {
        async fn get_context(&self, _request: &str) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn identity_is_family_and_model() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let adapter = adapter(provider, Arc::new(ToolRegistry::new()));
        assert_eq!(adapter.identity(), "openai-mock-model");
    }

    #[test]
    fn update_messages_applies_history_then_assistant_then_user() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let mut adapter = adapter(provider, Arc::new(ToolRegistry::new()));

        adapter.update_messages(MessageUpdate {
            history: Some(vec![Message::user("old question")]),
            assistant: Some("old answer".into()),
            user: Some("new question".into()),
        });

        let roles: Vec<Role> = adapter.conversation().messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(adapter.conversation().last_user_text(), Some("new question"));
    }

    #[test]
    fn reset_conversation_seeds_persona_and_request() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let mut adapter = adapter(provider, Arc::new(ToolRegistry::new()));
        adapter.update_messages(MessageUpdate::user("noise"));

        adapter.reset_conversation(Some("Hello"));
        assert_eq!(adapter.conversation().len(), 2);
        adapter.reset_conversation(None);
        assert_eq!(adapter.conversation().len(), 1);
        assert_eq!(adapter.conversation().persona(), Some("You are a helpful travel agent."));
    }

    #[tokio::test]
    async fn make_request_uses_scratch_history_and_truncates() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_reply("Hi!")]));
        let mut settings = AdapterSettings::new("mock-model", "persona");
        settings.request_char_limit = 5;
        let mut adapter = ProviderAdapter::new(
            BackendFamily::Anthropic,
            provider.clone(),
            settings,
            Arc::new(ToolRegistry::new()),
        );

        let answer = collect_text(adapter.make_request("", "Hello there", RequestOptions::default()))
            .await
            .unwrap();

        assert_eq!(answer, "Hi!");
        let sent = provider.requests();
        assert_eq!(sent[0].messages.len(), 2);
        assert_eq!(sent[0].messages[0].text(), "persona");
        assert_eq!(sent[0].messages[1].text(), "Hello");
        // the session is untouched
        assert_eq!(adapter.conversation().len(), 1);
    }

    #[tokio::test]
    async fn make_request_overrides_persona_and_defaults_request() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_reply("ok")]));
        let mut settings = AdapterSettings::new("mock-model", "persona");
        settings.default_request = "Say hello".into();
        let mut adapter = ProviderAdapter::new(
            BackendFamily::OpenAi,
            provider.clone(),
            settings,
            Arc::new(ToolRegistry::new()),
        );

        collect_text(adapter.make_request("Be terse.", "", RequestOptions::default().with_json(true)))
            .await
            .unwrap();

        let sent = provider.requests();
        assert_eq!(sent[0].messages[0].text(), "Be terse.");
        assert_eq!(sent[0].messages[1].text(), "Say hello");
        assert!(sent[0].json_mode);
    }

    #[tokio::test]
    async fn paris_ticket_price_takes_one_follow_up() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_reply(vec![paris_call()]),
            text_reply("A return ticket to Paris costs $899."),
        ]));
        let mut adapter = adapter(provider.clone(), ticket_registry());
        adapter.update_messages(MessageUpdate::user("How much is a ticket to Paris?"));

        let answer = collect_text(adapter.make_assistant_request(RequestOptions::default().with_tools(true)))
            .await
            .unwrap();

        assert_eq!(answer, "A return ticket to Paris costs $899.");
        let sent = provider.requests();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].has_tools());

        let follow_up = &sent[1].messages;
        let result = follow_up.last().unwrap();
        assert_eq!(result.role, Role::Tool);
        assert_eq!(result.text(), "$899");
        assert_eq!(result.tool_call_id.as_deref(), Some("call_paris"));
        assert_eq!(follow_up[follow_up.len() - 2].tool_calls[0], paris_call());
    }

    #[tokio::test]
    async fn streamed_fragmented_tool_call_is_dispatched() {
        let piece = |id: Option<&str>, name: Option<&str>, args: &str| {
            StreamFragment::ToolCall(ToolCallFragment {
                index: 0,
                id: id.map(String::from),
                name: name.map(String::from),
                arguments: Some(args.into()),
            })
        };
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        provider.push_stream(vec![
            piece(Some("call_paris"), Some("get_ticket_price"), ""),
            piece(None, None, r#"{"destination"#),
            piece(None, None, r#"_city":"Paris"}"#),
        ]);
        provider.push_stream(vec![
            StreamFragment::content("It is "),
            StreamFragment::content("$899."),
        ]);
        let mut adapter = adapter(provider.clone(), ticket_registry());
        adapter.update_messages(MessageUpdate::user("Paris?"));

        let answer = collect_text(adapter.make_assistant_request(RequestOptions::streaming().with_tools(true)))
            .await
            .unwrap();

        assert_eq!(answer, "It is $899.");
        let tool_msg = adapter.conversation().last().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.text(), "$899");
        assert_eq!(provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn streamed_preamble_is_not_recorded_twice() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        provider.push_stream(vec![
            StreamFragment::content("Let me check. "),
            StreamFragment::ToolCall(ToolCallFragment {
                index: 0,
                id: Some("call_paris".into()),
                name: Some("get_ticket_price".into()),
                arguments: Some(r#"{"destination_city":"Paris"}"#.into()),
            }),
        ]);
        provider.push_stream(vec![StreamFragment::content("It is $899.")]);
        let mut adapter = adapter(provider, ticket_registry());
        adapter.update_messages(MessageUpdate::user("Paris?"));

        let answer = collect_text(adapter.make_assistant_request(RequestOptions::streaming().with_tools(true)))
            .await
            .unwrap();
        assert_eq!(answer, "Let me check. It is $899.");
        adapter.update_messages(MessageUpdate::assistant(answer));

        let occurrences = adapter
            .conversation()
            .messages()
            .iter()
            .filter(|m| m.text().contains("Let me check."))
            .count();
        assert_eq!(occurrences, 1);

        let record = &adapter.conversation().messages()[2];
        assert_eq!(record.tool_calls[0].id, "call_paris");
        assert!(record.content.is_none());
    }

    #[tokio::test]
    async fn whole_preamble_stays_on_the_tool_call_record() {
        let mut reply = tool_reply(vec![paris_call()]);
        reply.message.content = Some("Let me check.".into());
        let provider = Arc::new(ScriptedProvider::new(vec![reply, text_reply("It is $899.")]));
        let mut adapter = adapter(provider, ticket_registry());
        adapter.update_messages(MessageUpdate::user("Paris?"));

        let answer = collect_text(adapter.make_assistant_request(RequestOptions::default().with_tools(true)))
            .await
            .unwrap();
        assert_eq!(answer, "It is $899.");
        assert_eq!(adapter.conversation().messages()[2].text(), "Let me check.");
    }

    #[tokio::test]
    async fn unknown_tool_grows_conversation_by_two() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_reply(vec![ToolCall {
                id: "call_rocket".into(),
                name: "launch_rocket".into(),
                arguments: "{}".into(),
            }]),
            text_reply("I can't launch rockets."),
        ]));
        let mut adapter = adapter(provider, ticket_registry());
        adapter.update_messages(MessageUpdate::user("Launch the rocket"));
        let before = adapter.conversation().len();

        let answer = collect_text(adapter.make_assistant_request(RequestOptions::default().with_tools(true)))
            .await
            .unwrap();

        assert_eq!(answer, "I can't launch rockets.");
        let messages = adapter.conversation().messages();
        assert_eq!(messages.len(), before + 2);
        assert_eq!(messages[before].tool_calls[0].name, "launch_rocket");
        assert!(messages[before + 1].text().contains("launch_rocket"));
    }

    #[tokio::test]
    async fn bad_arguments_reach_the_model_as_error_text() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_reply(vec![ToolCall {
                id: "call_bad".into(),
                name: "get_ticket_price".into(),
                arguments: "{not json".into(),
            }]),
            text_reply("Sorry, let me try again."),
        ]));
        let mut adapter = adapter(provider, ticket_registry());
        adapter.update_messages(MessageUpdate::user("Paris?"));

        collect_text(adapter.make_assistant_request(RequestOptions::default().with_tools(true)))
            .await
            .unwrap();

        let tool_msg = adapter.conversation().last().unwrap();
        assert!(tool_msg.text().starts_with("Error:"));
    }

    #[tokio::test]
    async fn tool_fallback_happens_once_per_adapter() {
        let provider = Arc::new(ToolRejectingProvider::new());
        let mut adapter = adapter(provider.clone(), ticket_registry());
        let options = RequestOptions::default().with_tools(true);

        adapter.update_messages(MessageUpdate::user("first"));
        let first = collect_text(adapter.make_assistant_request(options)).await.unwrap();
        assert!(adapter.tools_disabled());

        adapter.update_messages(MessageUpdate::assistant(first).and_user("second"));
        collect_text(adapter.make_assistant_request(options)).await.unwrap();

        let sent = provider.requests();
        assert_eq!(sent.len(), 3);
        assert!(sent[0].has_tools());
        assert!(!sent[1].has_tools());
        assert!(!sent[2].has_tools());
    }

    #[tokio::test]
    async fn failed_retry_after_fallback_is_request_failure() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        provider.push_error(ProviderError::ToolsRejected("no tools".into()));
        provider.push_error(ProviderError::ApiError {
            status_code: 500,
            message: "boom".into(),
        });
        let mut adapter = adapter(provider, ticket_registry());
        adapter.update_messages(MessageUpdate::user("hi"));

        let err = collect_text(adapter.make_assistant_request(RequestOptions::default().with_tools(true)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::RequestFailed(_))));
    }

    #[tokio::test]
    async fn empty_response_is_request_failure() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_reply("")]));
        let mut adapter = adapter(provider, Arc::new(ToolRegistry::new()));

        let err = collect_text(adapter.make_request("", "hi", RequestOptions::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::RequestFailed(_))));
    }

    #[tokio::test]
    async fn empty_stream_is_request_failure() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        provider.push_stream(vec![]);
        let mut adapter = adapter(provider, Arc::new(ToolRegistry::new()));

        let err = collect_text(adapter.make_request("", "hi", RequestOptions::streaming()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::RequestFailed(_))));
    }

    #[tokio::test]
    async fn tools_not_attached_when_backend_lacks_support() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_reply("ok")]).without_tool_support());
        let mut adapter = adapter(provider.clone(), ticket_registry());
        adapter.update_messages(MessageUpdate::user("hi"));

        collect_text(adapter.make_assistant_request(RequestOptions::default().with_tools(true)))
            .await
            .unwrap();
        assert!(!provider.requests()[0].has_tools());
    }

    #[tokio::test]
    async fn tool_rounds_are_bounded() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_reply(vec![paris_call()]),
            text_reply("done"),
        ]));
        let mut adapter = adapter(provider.clone(), ticket_registry()).with_max_tool_rounds(1);
        adapter.update_messages(MessageUpdate::user("Paris?"));

        collect_text(adapter.make_assistant_request(RequestOptions::default().with_tools(true)))
            .await
            .unwrap();

        let sent = provider.requests();
        assert!(sent[0].has_tools());
        assert!(!sent[1].has_tools());
    }

    #[tokio::test]
    async fn context_is_appended_to_outbound_system_only() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_reply("ok"), text_reply("ok")]));
        let mut adapter = adapter(provider.clone(), Arc::new(ToolRegistry::new()))
            .with_context(Arc::new(FixedContext("Paris flights leave daily.")));

        collect_text(adapter.make_request("", "hi", RequestOptions::default()))
            .await
            .unwrap();
        adapter.update_messages(MessageUpdate::user("hi"));
        collect_text(adapter.make_assistant_request(RequestOptions::default()))
            .await
            .unwrap();

        let sent = provider.requests();
        for request in &sent {
            assert_eq!(
                request.messages[0].text(),
                "You are a helpful travel agent.\n\nParis flights leave daily."
            );
        }
        assert_eq!(
            adapter.conversation().persona(),
            Some("You are a helpful travel agent.")
        );
    }

    #[tokio::test]
    async fn replaced_history_without_system_still_sends_persona() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_reply("ok")]));
        let mut adapter = adapter(provider.clone(), Arc::new(ToolRegistry::new()));
        adapter.update_messages(MessageUpdate::history(vec![Message::user("hi")]));

        collect_text(adapter.make_assistant_request(RequestOptions::default()))
            .await
            .unwrap();

        let sent = &provider.requests()[0].messages;
        assert_eq!(sent[0].role, Role::System);
        assert_eq!(sent.len(), 2);
        assert_eq!(adapter.conversation().len(), 1);
    }
}
