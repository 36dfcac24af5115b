//! Conversation: the ordered message history of one adapter.
//!
//! Invariants kept by every mutation except [`Conversation::replace_history`]:
//! a system message, if present, is the first message; a tool message directly
//! follows an assistant message (or a sibling tool message) whose `tool_calls`
//! contain its id.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::message::{Message, Role, ToolCall};

/// An ordered sequence of messages owned by one provider adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a conversation seeded with a persona system message.
    pub fn with_persona(persona: &str) -> Self {
        let mut conversation = Self::new();
        conversation.reset(Some(persona), None);
        conversation
    }

    /// Clear history, then seed the persona (as system) and the seed request (as user).
    ///
    /// Empty strings count as absent.
    pub fn reset(&mut self, persona: Option<&str>, seed_request: Option<&str>) {
        self.messages.clear();
        if let Some(persona) = persona.filter(|p| !p.is_empty()) {
            self.messages.push(Message::system(persona));
        }
        if let Some(seed) = seed_request.filter(|s| !s.is_empty()) {
            self.messages.push(Message::user(seed));
        }
    }

    pub fn append_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    pub fn append_assistant(&mut self, text: impl Into<String>) {
        self.messages.push(Message::assistant(text));
    }

    /// Record the tool calls an assistant turn requested, with whatever text it
    /// produced alongside them.
    pub fn append_tool_calls(&mut self, content: Option<String>, tool_calls: Vec<ToolCall>) {
        self.messages
            .push(Message::assistant_tool_calls(content, tool_calls));
    }

    /// Append a tool result. Fails if `call_id` does not answer a call in the
    /// closest preceding assistant tool-call record.
    pub fn append_tool_result(
        &mut self,
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<()> {
        let call_id = call_id.into();
        let pending = self
            .messages
            .iter()
            .rev()
            .find(|m| m.role != Role::Tool)
            .filter(|m| m.role == Role::Assistant)
            .is_some_and(|m| m.tool_calls.iter().any(|c| c.id == call_id));

        if !pending {
            return Err(Error::OrphanToolResult { call_id });
        }

        self.messages
            .push(Message::tool_result(call_id, name, content));
        Ok(())
    }

    /// Substitute an externally maintained transcript.
    ///
    /// Transport metadata is stripped; ordering is not enforced. A transcript
    /// that breaks the invariants is logged and passed through for the backend
    /// to judge.
    pub fn replace_history(&mut self, messages: Vec<Message>) {
        let mut messages = messages;
        for message in &mut messages {
            message.metadata.clear();
        }
        if let Some(problem) = ordering_violation(&messages) {
            warn!(%problem, "Replacing history with a transcript that breaks role ordering");
        }
        debug!(count = messages.len(), "Conversation history replaced");
        self.messages = messages;
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Content of the leading system message, if any.
    pub fn persona(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == Role::System)
            .map(Message::text)
    }

    /// Content of the most recent user message, if any.
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(Message::text)
    }
}

/// Describe the first role-ordering violation in `messages`, if there is one.
pub fn ordering_violation(messages: &[Message]) -> Option<String> {
    let mut answerable: Vec<&str> = Vec::new();

    for (i, message) in messages.iter().enumerate() {
        match message.role {
            Role::System if i > 0 => {
                return Some(format!("system message at position {i}"));
            }
            Role::Tool => {
                let id = message.tool_call_id.as_deref().unwrap_or("");
                if !answerable.contains(&id) {
                    return Some(format!("tool result '{id}' at position {i} has no matching call"));
                }
                continue;
            }
            Role::Assistant => {
                answerable = message.tool_calls.iter().map(|c| c.id.as_str()).collect();
                continue;
            }
            _ => {}
        }
        answerable.clear();
    }

    None
}
