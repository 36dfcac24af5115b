//! One-shot prompting of a named backend profile.
//!
//! Tools that need to ask another model (e.g. `simple_request`) depend on this
//! trait instead of on the adapter machinery that implements it.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait PromptRunner: Send + Sync {
    /// Send `request` under `persona` to `profile` and return the whole answer.
    ///
    /// `"-"` or an empty profile selects the configured default.
    async fn run_prompt(&self, profile: &str, persona: &str, request: &str) -> Result<String>;
}
