//! File write tool with path containment.
//!
//! Overwrites without diff or backup; the description warns the model.

use async_trait::async_trait;
use chatclaw_core::error::ToolError;
use chatclaw_core::tool::Tool;
use chatclaw_security::SecurityPolicy;
use std::sync::Arc;

pub struct WriteFileTool {
    policy: Arc<SecurityPolicy>,
}

impl WriteFileTool {
    pub fn new(policy: Arc<SecurityPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file. CAUTION: This will overwrite existing files without a diff or backup."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path of the file to write to."
                },
                "content": {
                    "type": "string",
                    "description": "The text content to write."
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<String, ToolError> {
        let path = args["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;
        let content = args["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;

        let resolved = crate::contain(&self.policy, "write_file", path)?;

        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "write_file".into(),
                    reason: format!("failed to create parent directory: {e}"),
                })?;
        }

        tokio::fs::write(&resolved, content)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "write_file".into(),
                reason: e.to_string(),
            })?;

        Ok(format!(
            "Success: wrote {} bytes to {path}",
            content.len()
        ))
    }
}
