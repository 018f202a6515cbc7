//! Terminal command tool — execute shell commands under the safety policy.
//!
//! Dangerous commands are refused unless the engine passes
//! `override_safety: true` (which it is instructed to do only after user
//! confirmation). Execution runs under a hard wall-clock ceiling; the
//! subprocess is killed on expiry.

use async_trait::async_trait;
use chatclaw_core::error::ToolError;
use chatclaw_core::tool::Tool;
use chatclaw_security::SecurityPolicy;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default wall-clock ceiling for a command.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub struct TerminalTool {
    policy: Arc<SecurityPolicy>,
    timeout: Duration,
}

impl TerminalTool {
    pub fn new(policy: Arc<SecurityPolicy>) -> Self {
        Self {
            policy,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Override the execution ceiling (used by tests).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Tool for TerminalTool {
    fn name(&self) -> &str {
        "run_terminal_command"
    }

    fn description(&self) -> &str {
        "Run a terminal command. Meant only for non-interactive commands. The output will be returned. Dangerous! Use with caution."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute."
                },
                "override_safety": {
                    "type": "boolean",
                    "description": "Set to true only if the user has explicitly confirmed a destructive action."
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<String, ToolError> {
        let command = args["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;
        let override_safety = args["override_safety"].as_bool().unwrap_or(false);

        if self.policy.check_command(command, override_safety).is_err() {
            return Err(ToolError::SafetyBlocked);
        }

        debug!(command = %command, "Executing terminal command");

        let child = Command::new("sh")
            .args(["-c", command])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "run_terminal_command".into(),
                reason: e.to_string(),
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ToolError::ExecutionFailed {
                    tool_name: "run_terminal_command".into(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                // Dropping the timed-out future drops the child, and
                // kill_on_drop reaps the subprocess.
                warn!(command = %command, "Command timed out");
                return Err(ToolError::Timeout {
                    tool_name: "run_terminal_command".into(),
                    timeout_secs: self.timeout.as_secs(),
                    output: "(no output captured)".into(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            if stderr.is_empty() {
                Ok(stdout)
            } else {
                Ok(format!("{stdout}\n[stderr]: {stderr}"))
            }
        } else {
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %command, exit_code = code, "Command failed");
            Err(ToolError::ExecutionFailed {
                tool_name: "run_terminal_command".into(),
                reason: format!("exit code {code}\nstdout: {stdout}\nstderr: {stderr}"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> TerminalTool {
        let dir = tempfile::tempdir().unwrap();
        TerminalTool::new(Arc::new(SecurityPolicy::new(dir.path()).unwrap()))
    }

    #[tokio::test]
    async fn runs_command_and_captures_stdout() {
        let out = tool()
            .execute(serde_json::json!({"command": "echo hello"}))
            .await
            .unwrap();
        assert!(out.contains("hello"));
    }

    #[tokio::test]
    async fn dangerous_command_is_blocked_without_override() {
        let err = tool()
            .execute(serde_json::json!({"command": "rm -rf tmp"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::SafetyBlocked));
    }

    #[tokio::test]
    async fn dangerous_command_runs_with_override() {
        // Harmless despite matching the denylist: rm of a file that does
        // not exist, with -f suppressing the error.
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("absent.txt");
        let out = tool()
            .execute(serde_json::json!({
                "command": format!("rm -f {} && echo done", target.display()),
                "override_safety": true
            }))
            .await
            .unwrap();
        assert!(out.contains("done"));
    }

    #[tokio::test]
    async fn nonzero_exit_includes_output() {
        let err = tool()
            .execute(serde_json::json!({"command": "ls /definitely/missing/path/xyz"}))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("exit code"));
        assert!(msg.contains("stderr"));
    }

    #[tokio::test]
    async fn timeout_kills_the_subprocess() {
        let dir = tempfile::tempdir().unwrap();
        let tool = TerminalTool::new(Arc::new(SecurityPolicy::new(dir.path()).unwrap()))
            .with_timeout(Duration::from_millis(100));

        let err = tool
            .execute(serde_json::json!({"command": "sleep 5"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn missing_command_argument() {
        let err = tool().execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
