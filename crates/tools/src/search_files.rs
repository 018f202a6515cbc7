//! Recursive text search tool.
//!
//! Walks the tree under the given path, skipping build, version-control and
//! cache directories, and reports `path:line:text` matches. Large result
//! sets are truncated with an explicit marker; no matches is a normal
//! result, not a fault.

use async_trait::async_trait;
use chatclaw_core::error::ToolError;
use chatclaw_core::tool::Tool;
use chatclaw_security::SecurityPolicy;
use regex::RegexBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use walkdir::WalkDir;

/// Directories never descended into.
const EXCLUDED_DIRS: &[&str] = &["target", ".git", "node_modules", ".cache", ".gemini"];

/// Maximum result length before truncation.
const MAX_RESULT_LEN: usize = 5000;

/// Search ceiling — shorter than the terminal tool's.
const SEARCH_TIMEOUT_SECS: u64 = 5;

pub struct SearchFilesTool {
    policy: Arc<SecurityPolicy>,
}

impl SearchFilesTool {
    pub fn new(policy: Arc<SecurityPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Search for a text pattern in files (grep). Use to find code definitions."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "The regex or text to search for."
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search. Defaults to the current directory."
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<String, ToolError> {
        let pattern = args["pattern"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'pattern' argument".into()))?;
        let path = args["path"].as_str().unwrap_or(".");

        let resolved = crate::contain(&self.policy, "search_files", path)?;

        // Invalid regex falls back to a literal search, matching what a
        // user means when they paste code fragments with metacharacters.
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .or_else(|_| {
                RegexBuilder::new(&regex::escape(pattern))
                    .case_insensitive(true)
                    .build()
            })
            .map_err(|e| ToolError::InvalidArguments(format!("bad pattern: {e}")))?;

        debug!(pattern = %pattern, path = %resolved.display(), "Searching files");

        let walk = tokio::task::spawn_blocking(move || search_tree(&resolved, &regex));
        match tokio::time::timeout(Duration::from_secs(SEARCH_TIMEOUT_SECS), walk).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(ToolError::ExecutionFailed {
                tool_name: "search_files".into(),
                reason: e.to_string(),
            }),
            Err(_) => Err(ToolError::Timeout {
                tool_name: "search_files".into(),
                timeout_secs: SEARCH_TIMEOUT_SECS,
                output: "(search abandoned)".into(),
            }),
        }
    }
}

/// Walk the tree collecting `path:line:text` matches, truncating past
/// [`MAX_RESULT_LEN`].
fn search_tree(root: &PathBuf, regex: &regex::Regex) -> String {
    let mut out = String::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        entry
            .file_name()
            .to_str()
            .map(|name| !EXCLUDED_DIRS.contains(&name))
            .unwrap_or(true)
    });

    'outer: for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        // Binary or unreadable files are silently skipped.
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        for (lineno, line) in content.lines().enumerate() {
            if regex.is_match(line) {
                out.push_str(&format!(
                    "{}:{}:{}\n",
                    entry.path().display(),
                    lineno + 1,
                    line
                ));
                if out.len() > MAX_RESULT_LEN {
                    break 'outer;
                }
            }
        }
    }

    if out.is_empty() {
        return "No matches found.".to_string();
    }

    if out.len() > MAX_RESULT_LEN {
        let mut end = MAX_RESULT_LEN;
        while !out.is_char_boundary(end) {
            end -= 1;
        }
        out.truncate(end);
        out.push_str("\n...[Truncated]");
    }

    out
}
