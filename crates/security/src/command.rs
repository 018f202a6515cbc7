//! Shell command policy — destructive-pattern denylist.
//!
//! Patterns cover: destructive remove, remove-directory, move/rename (can
//! overwrite), output-redirection overwrite, and privilege elevation. The
//! redirection pattern is deliberately naive: any `>` not followed by an
//! absolute path counts as an overwrite.

use regex::Regex;
use std::sync::LazyLock;

static DANGEROUS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\brm\b",    // remove
        r"(?i)\brmdir\b", // remove dir
        r"(?i)\bmv\b",    // move/rename
        r">\s*[^/]",      // redirection overwrite
        r"(?i)\bsudo\b",  // superuser
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Whether the command matches any destructive pattern.
pub fn is_dangerous_command(command: &str) -> bool {
    DANGEROUS_PATTERNS.iter().any(|p| p.is_match(command))
}

/// Error marking a command refused by the policy.
#[derive(Debug, thiserror::Error)]
#[error("command matches a destructive pattern and no override was supplied")]
pub struct CommandBlocked;
