//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! list and read files, write files, run shell commands, search text,
//! generate images.
//!
//! A tool never lets a fault escape past the dispatcher: `execute` may
//! return a `ToolError`, but `ToolRegistry::dispatch` converts it into a
//! descriptive string for the engine. An unrecognized tool name yields the
//! fixed [`TOOL_NOT_FOUND`] string rather than an error.

use crate::engine::ToolDefinition;
use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fixed dispatcher result for an unknown tool name.
pub const TOOL_NOT_FOUND: &str = "Error: tool not found";

/// Reserved prefix marking a tool result as a generated-artifact sentinel:
/// the orchestration loop delivers the named binary outward before feeding
/// the result back to the engine.
pub const IMAGE_SENTINEL_PREFIX: &str = "IMAGE_GENERATED: ";

/// A request to execute a tool, as issued by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to execute.
    pub name: String,

    /// Arguments as a JSON object.
    pub args: serde_json::Value,
}

/// The core Tool trait.
///
/// Each tool (list_files, read_file, write_file, run_terminal_command,
/// search_files, generate_image) implements this trait. Tools are registered
/// in the ToolRegistry and declared to the engine at session start.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the engine).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments, producing the string
    /// result the engine will see.
    async fn execute(&self, args: serde_json::Value) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for the engine.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// The orchestration loop uses this to:
/// 1. Get tool definitions to declare to the engine
/// 2. Dispatch tool calls when the engine requests them
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions (for declaring to the engine).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Dispatch a tool call. Never raises: faults become descriptive
    /// strings, and an unknown name yields [`TOOL_NOT_FOUND`].
    pub async fn dispatch(&self, call: &ToolCall) -> String {
        let Some(tool) = self.tools.get(&call.name) else {
            return TOOL_NOT_FOUND.to_string();
        };
        match tool.execute(call.args.clone()).await {
            Ok(output) => output,
            Err(e) => e.to_string(),
        }
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
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
        async fn execute(
            &self,
            args: serde_json::Value,
        ) -> std::result::Result<String, ToolError> {
            Ok(args["text"].as_str().unwrap_or("").to_string())
        }
    }

    /// A tool that always fails, for dispatcher conversion tests.
    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object", "properties": {} })
        }
        async fn execute(
            &self,
            _args: serde_json::Value,
        ) -> std::result::Result<String, ToolError> {
            Err(ToolError::NotFound("missing.txt".into()))
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn registry_definitions() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }

    #[tokio::test]
    async fn dispatch_executes_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let call = ToolCall {
            name: "echo".into(),
            args: serde_json::json!({"text": "hello world"}),
        };
        assert_eq!(registry.dispatch(&call).await, "hello world");
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_yields_fixed_string() {
        let registry = ToolRegistry::new();
        let call = ToolCall {
            name: "nonexistent".into(),
            args: serde_json::json!({}),
        };
        assert_eq!(registry.dispatch(&call).await, TOOL_NOT_FOUND);
    }

    #[tokio::test]
    async fn dispatch_converts_faults_to_strings() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(FailingTool));

        let call = ToolCall {
            name: "failing".into(),
            args: serde_json::json!({}),
        };
        let result = registry.dispatch(&call).await;
        assert!(result.contains("File not found"));
        assert!(result.contains("missing.txt"));
    }
}
