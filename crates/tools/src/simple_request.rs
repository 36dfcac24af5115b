//! Simple request tool: forwards a question to another configured profile.

use std::sync::Arc;

use async_trait::async_trait;
use parley_core::error::ToolError;
use parley_core::prompt::PromptRunner;
use parley_core::tool::{Tool, parse_arguments};
use serde::Deserialize;
use tracing::info;

use crate::model_schema;

pub struct SimpleRequestTool {
    runner: Arc<dyn PromptRunner>,
    models: Vec<String>,
}

impl SimpleRequestTool {
    /// `models` are the configured profile names the model may pick from.
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
    request: String,
}

#[async_trait]
impl Tool for SimpleRequestTool {
    fn name(&self) -> &str {
        "simple_request"
    }

    fn description(&self) -> &str {
        "Makes a simple request to another llm or model. Call this whenever a person asks 'could you \
         ask <model> about <request>'. Only use this tool if the words 'could you ask' appear exactly \
         in that order."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "model": model_schema(&self.models),
                "request": {
                    "type": "string",
                    "description": "The request to the model that someone wants to gain understanding from"
                }
            },
            "required": ["model", "request"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let args: Args = parse_arguments(arguments)?;
        info!(model = %args.model, "Forwarding request to another profile");

        self.runner
            .run_prompt(&args.model, "", &args.request)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })
    }
}
