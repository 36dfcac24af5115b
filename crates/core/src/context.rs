//! Context provider: retrieval text appended to the system message.

use async_trait::async_trait;

/// Supplies background text for a request (a knowledge base, a document index).
///
/// An empty string means "no context" and appends nothing.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn get_context(&self, request: &str) -> String;
}

/// Append `context` to `system` as its own paragraph. Empty context leaves `system` as is.
pub fn with_context(system: &str, context: &str) -> String {
    let context = context.trim();
    match (system.is_empty(), context.is_empty()) {
        (_, true) => system.to_string(),
        (true, false) => context.to_string(),
        (false, false) => format!("{system}\n\n{context}"),
    }
}
