//! Built-in tool implementations for chatclaw.
//!
//! Tools give the agent the ability to interact with the world: list, read,
//! write and search files, run shell commands, and generate images. Every
//! filesystem and shell tool consults the [`SecurityPolicy`] before acting;
//! nothing a tool does may escape the configured project root.

pub mod generate_image;
pub mod list_files;
pub mod read_file;
pub mod search_files;
pub mod terminal;
pub mod write_file;

use std::path::PathBuf;
use std::sync::Arc;

use chatclaw_core::engine::Engine;
use chatclaw_core::error::ToolError;
use chatclaw_core::tool::ToolRegistry;
use chatclaw_security::{PathError, SecurityPolicy};

pub use generate_image::GenerateImageTool;
pub use list_files::ListFilesTool;
pub use read_file::ReadFileTool;
pub use search_files::SearchFilesTool;
pub use terminal::TerminalTool;
pub use write_file::WriteFileTool;

/// Create the default tool registry with all built-in tools.
///
/// `policy` scopes every filesystem and shell operation; `engine` backs the
/// image generation tool; `artifacts_dir` receives generated binaries.
pub fn default_registry(
    policy: Arc<SecurityPolicy>,
    engine: Arc<dyn Engine>,
    artifacts_dir: PathBuf,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ListFilesTool::new(policy.clone())));
    registry.register(Box::new(ReadFileTool::new(policy.clone())));
    registry.register(Box::new(WriteFileTool::new(policy.clone())));
    registry.register(Box::new(TerminalTool::new(policy.clone())));
    registry.register(Box::new(SearchFilesTool::new(policy)));
    registry.register(Box::new(GenerateImageTool::new(engine, artifacts_dir)));
    registry
}

/// Resolve a candidate path against the policy, mapping boundary escapes to
/// `AccessDenied` and resolution failures to `ExecutionFailed`.
pub(crate) fn contain(
    policy: &SecurityPolicy,
    tool_name: &str,
    candidate: &str,
) -> Result<PathBuf, ToolError> {
    match policy.contain(candidate) {
        Ok(resolved) => Ok(resolved),
        Err(PathError::OutsideRoot { .. }) => Err(ToolError::AccessDenied {
            root: policy.root().display().to_string(),
        }),
        Err(e) => Err(ToolError::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatclaw_core::engine::{EngineReply, ToolDefinition};
    use chatclaw_core::error::EngineError;
    use chatclaw_core::turn::{Part, Turn};

    struct NullEngine;

    #[async_trait]
    impl Engine for NullEngine {
        fn name(&self) -> &str {
            "null"
        }
        async fn exchange(
            &self,
            _history: &[Turn],
            _tools: &[ToolDefinition],
        ) -> Result<EngineReply, EngineError> {
            Ok(EngineReply::default())
        }
        async fn generate_image(&self, _prompt: &str) -> Result<Vec<Part>, EngineError> {
            Ok(vec![])
        }
    }

    #[test]
    fn default_registry_has_all_six_tools() {
        let dir = tempfile::tempdir().unwrap();
        let policy = Arc::new(SecurityPolicy::new(dir.path()).unwrap());
        let registry = default_registry(
            policy,
            Arc::new(NullEngine),
            dir.path().join("artifacts"),
        );

        let mut names = registry.names();
        names.sort();
        assert_eq!(
            names,
            vec![
                "generate_image",
                "list_files",
                "read_file",
                "run_terminal_command",
                "search_files",
                "write_file",
            ]
        );
    }
}
