//! Tool trait: host functions the model may call mid-conversation.
//!
//! Tools are registered once at startup into a [`ToolRegistry`]; the registry
//! advertises their descriptors to backends and dispatches calls by exact name.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ToolError;
use crate::message::ToolCall;

/// A tool definition sent to the LLM so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

impl ToolDescriptor {
    /// Build a descriptor. Object schemas are closed: `additionalProperties`
    /// is forced to `false` and `required` defaults to an empty list.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        let mut parameters = parameters;
        if let Some(schema) = parameters.as_object_mut() {
            schema.insert("additionalProperties".into(), serde_json::Value::Bool(false));
            schema
                .entry("required")
                .or_insert_with(|| serde_json::Value::Array(Vec::new()));
        }
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// The `{type: "function", function: {...}}` shape chat-completion backends expect.
    pub fn to_wire(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// The core Tool trait.
///
/// Each tool deserializes its own arguments, so parameters are matched by
/// name rather than position.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "get_ticket_price").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with parsed arguments and return the result text.
    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(self.name(), self.description(), self.parameters_schema())
    }
}

/// Decode a tool's arguments into its typed parameter struct.
pub fn parse_arguments<T: serde::de::DeserializeOwned>(
    arguments: serde_json::Value,
) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// A closed, ordered registry of tools.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register a tool. A tool with the same name is replaced in place.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        match self.by_name.get(&name) {
            Some(&slot) => self.tools[slot] = tool,
            None => {
                self.by_name.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Get a tool by exact name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.by_name.get(name).map(|&slot| self.tools[slot].as_ref())
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run `name` with JSON-encoded `arguments`.
    ///
    /// An unregistered name is not an error: the model picked it, so it gets
    /// a descriptive reply instead. Undecodable arguments are
    /// [`ToolError::InvalidArguments`].
    pub async fn dispatch(&self, name: &str, arguments: &str) -> Result<String, ToolError> {
        let Some(tool) = self.get(name) else {
            warn!(tool = %name, "Model called an unregistered tool");
            return Ok(format!("no tool found named '{name}'"));
        };

        let arguments = if arguments.trim().is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(arguments)
                .map_err(|e| ToolError::InvalidArguments(format!("{name}: {e}")))?
        };

        info!(tool = %name, "Executing tool");
        tool.execute(arguments).await
    }

    /// Dispatch a call and always produce result text; failures become
    /// `Error: ...` for the model to read.
    pub async fn dispatch_call(&self, call: &ToolCall) -> String {
        match self.dispatch(&call.name, &call.arguments).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                format!("Error: {e}")
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[derive(Deserialize)]
    struct EchoArgs {
        text: String,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
            let args: EchoArgs = parse_arguments(arguments)?;
            Ok(args.text)
        }
    }

    struct NamedTool(&'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "named"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object", "properties": {} })
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("Echo").is_none());
    }

    #[test]
    fn registry_keeps_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(NamedTool("b")));
        registry.register(Box::new(NamedTool("a")));
        registry.register(Box::new(NamedTool("b")));
        assert_eq!(registry.names(), vec!["b", "a"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn descriptor_schema_is_closed() {
        let descriptor = EchoTool.descriptor();
        assert_eq!(descriptor.parameters["additionalProperties"], false);
        assert_eq!(descriptor.parameters["required"][0], "text");

        let open = NamedTool("x").descriptor();
        assert_eq!(open.parameters["required"], serde_json::json!([]));
    }

    #[test]
    fn descriptor_wire_shape() {
        let wire = EchoTool.descriptor().to_wire();
        assert_eq!(wire["type"], "function");
        assert_eq!(wire["function"]["name"], "echo");
        assert_eq!(wire["function"]["parameters"]["type"], "object");
    }

    #[tokio::test]
    async fn dispatch_runs_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let out = registry.dispatch("echo", r#"{"text":"hello"}"#).await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_is_descriptive() {
        let registry = ToolRegistry::new();
        let out = registry.dispatch("launch_rocket", "{}").await.unwrap();
        assert!(out.contains("launch_rocket"));
    }

    #[tokio::test]
    async fn dispatch_bad_json_is_invalid_arguments() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let err = registry.dispatch("echo", "{not json").await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn dispatch_call_degrades_errors() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let call = ToolCall {
            id: "call_1".into(),
            name: "echo".into(),
            arguments: r#"{"wrong":1}"#.into(),
        };
        let out = registry.dispatch_call(&call).await;
        assert!(out.starts_with("Error: Invalid tool arguments"));
    }
}
