//! Directory listing tool with path containment.

use async_trait::async_trait;
use chatclaw_core::error::ToolError;
use chatclaw_core::tool::Tool;
use chatclaw_security::SecurityPolicy;
use std::sync::Arc;

pub struct ListFilesTool {
    policy: Arc<SecurityPolicy>,
}

impl ListFilesTool {
    pub fn new(policy: Arc<SecurityPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files and directories in the project. Use this to see the project structure."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The directory path to list. Defaults to the current directory."
                }
            }
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<String, ToolError> {
        let path = args["path"].as_str().unwrap_or(".");
        let resolved = crate::contain(&self.policy, "list_files", path)?;

        let mut entries =
            tokio::fs::read_dir(&resolved)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "list_files".into(),
                    reason: e.to_string(),
                })?;

        let mut names = Vec::new();
        while let Some(entry) =
            entries
                .next_entry()
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "list_files".into(),
                    reason: e.to_string(),
                })?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();

        serde_json::to_string(&names).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "list_files".into(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_for(dir: &std::path::Path) -> ListFilesTool {
        ListFilesTool::new(Arc::new(SecurityPolicy::new(dir).unwrap()))
    }

    #[test]
    fn tool_definition() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_for(dir.path());
        assert_eq!(tool.name(), "list_files");
        assert!(tool.parameters_schema()["properties"]["path"].is_object());
    }

    #[tokio::test]
    async fn lists_directory_as_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let tool = tool_for(dir.path());
        let out = tool
            .execute(serde_json::json!({"path": dir.path().to_str().unwrap()}))
            .await
            .unwrap();

        let names: Vec<String> = serde_json::from_str(&out).unwrap();
        assert_eq!(names, vec!["a.txt", "sub"]);
    }

    #[tokio::test]
    async fn escaping_path_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        std::fs::create_dir(&root).unwrap();

        let tool = tool_for(&root);
        let err = tool
            .execute(serde_json::json!({"path": dir.path().to_str().unwrap()}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn missing_directory_reports_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_for(dir.path());
        let missing = dir.path().join("nope");
        let err = tool
            .execute(serde_json::json!({"path": missing.to_str().unwrap()}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }
}
