//! Joke tool: asks a configured profile for a joke.

use std::sync::Arc;

use async_trait::async_trait;
use parley_core::error::ToolError;
use parley_core::prompt::PromptRunner;
use parley_core::tool::{Tool, parse_arguments};
use serde::Deserialize;
use tracing::info;

use crate::model_schema;

const JOKE_PERSONA: &str = "You are an assistant that is great at telling jokes.";

/// Persona and request for a joke. The CLI `joke` command uses the same pair.
pub fn joke_prompt(joke_type: &str, audience: &str, tone: Option<&str>) -> (String, String) {
    let persona = match tone.map(str::trim).filter(|t| !t.is_empty()) {
        Some(tone) => format!("{JOKE_PERSONA} {tone}"),
        None => JOKE_PERSONA.to_string(),
    };
    let request = format!("Tell a {joke_type} joke for an audience of {audience}.");
    (persona, request)
}

pub struct TellJokeTool {
    runner: Arc<dyn PromptRunner>,
    models: Vec<String>,
}

impl TellJokeTool {
    pub fn new(runner: Arc<dyn PromptRunner>, models: &[String]) -> Self {
        Self {
            runner,
            models: models.to_vec(),
        }
    }
}

#[derive(Deserialize)]
struct Args {
    #[serde(default)]
    model: String,
    joke_type: String,
    audience: String,
    #[serde(default)]
    tone: Option<String>,
}

#[async_trait]
impl Tool for TellJokeTool {
    fn name(&self) -> &str {
        "tell_joke"
    }

    fn description(&self) -> &str {
        "Creates a joke using parameters. Call this whenever someone asks 'use <model> to tell a \
         <joke_type> joke in a <tone> tone for an audience of <audience>', or any variation of \
         someone asking for a joke."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "model": model_schema(&self.models),
                "joke_type": {
                    "type": "string",
                    "description": "Type of joke to make for a given audience"
                },
                "tone": {
                    "type": "string",
                    "description": "The tone the joke should be made in"
                },
                "audience": {
                    "type": "string",
                    "description": "The audience of the joke, i.e. who wants to hear it"
                }
            },
            "required": ["model", "joke_type", "audience"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let args: Args = parse_arguments(arguments)?;
        info!(
            model = %args.model,
            joke_type = %args.joke_type,
            audience = %args.audience,
            "Telling a joke"
        );

        let (persona, request) = joke_prompt(&args.joke_type, &args.audience, args.tone.as_deref());
        self.runner
            .run_prompt(&args.model, &persona, &request)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })
    }
}
