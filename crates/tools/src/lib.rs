//! Host tools for parley.
//!
//! Tools give the model a way to act mid-conversation: look up a ticket
//! price, ask another configured model a question, or have one tell a joke.
//! Tools that talk to other models do so through a [`PromptRunner`].

pub mod simple_request;
pub mod tell_joke;
pub mod ticket_price;

use std::sync::Arc;

use parley_core::prompt::PromptRunner;
use parley_core::tool::ToolRegistry;

pub use simple_request::SimpleRequestTool;
pub use tell_joke::{TellJokeTool, joke_prompt};
pub use ticket_price::TicketPriceTool;

/// Create the registry the chat front end offers to models.
///
/// `get_ticket_price` is always present. The model-calling tools need a
/// `runner` and advertise `models` (plus `-` for the default profile).
pub fn default_registry(runner: Option<Arc<dyn PromptRunner>>, models: &[String]) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(TicketPriceTool));
    if let Some(runner) = runner {
        registry.register(Box::new(SimpleRequestTool::new(runner.clone(), models)));
        registry.register(Box::new(TellJokeTool::new(runner, models)));
    }
    registry
}

/// Schema for a `model` argument choosing among configured profiles.
pub(crate) fn model_schema(models: &[String]) -> serde_json::Value {
    let mut choices = vec!["-".to_string()];
    choices.extend(models.iter().filter(|m| m.as_str() != "-").cloned());
    serde_json::json!({
        "type": "string",
        "enum": choices,
        "description": "The profile named in your system content as 'model=<name>', or '-' for the default",
        "default": "-"
    })
}
