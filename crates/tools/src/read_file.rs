//! File read tool with path containment.

use async_trait::async_trait;
use chatclaw_core::error::ToolError;
use chatclaw_core::tool::Tool;
use chatclaw_security::SecurityPolicy;
use std::sync::Arc;

pub struct ReadFileTool {
    policy: Arc<SecurityPolicy>,
}

impl ReadFileTool {
    pub fn new(policy: Arc<SecurityPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the content of a file."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path of the file to read."
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<String, ToolError> {
        let path = args["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let resolved = crate::contain(&self.policy, "read_file", path)?;

        if !resolved.exists() {
            return Err(ToolError::NotFound(path.to_string()));
        }

        tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "read_file".into(),
                reason: e.to_string(),
            })
    }
}
