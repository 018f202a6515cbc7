//! Security boundary for chatclaw.
//!
//! Provides:
//! - **Path containment**: every filesystem path a tool touches must resolve
//!   to the configured root directory or a descendant of it
//! - **Command policy**: shell commands matching destructive patterns are
//!   refused unless an explicit override is supplied

pub mod command;
pub mod path;

pub use command::{CommandBlocked, is_dangerous_command};
pub use path::{PathError, resolve_absolute};

use std::path::{Path, PathBuf};

/// The security boundary: one absolute root directory plus the
/// dangerous-command policy.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    root: PathBuf,
}

impl SecurityPolicy {
    /// Create a policy rooted at `root`. The root is canonicalized so that
    /// later containment checks compare resolved paths against resolved
    /// paths.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, PathError> {
        let root = resolve_absolute(root.as_ref())?;
        Ok(Self { root })
    }

    /// The canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `candidate` (relative paths against the working directory,
    /// `.`/`..` and symlinked segments collapsed) and return the canonical
    /// path iff it equals the root or is a path-segment-wise descendant.
    ///
    /// Containment uses `Path::starts_with`, which compares whole
    /// components: root `/a/b` rejects the sibling `/a/bc` that a naive
    /// string-prefix comparison would accept.
    pub fn contain(&self, candidate: impl AsRef<Path>) -> Result<PathBuf, PathError> {
        let resolved = resolve_absolute(candidate.as_ref())?;
        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(PathError::OutsideRoot {
                path: candidate.as_ref().display().to_string(),
                root: self.root.display().to_string(),
            })
        }
    }

    /// Apply the dangerous-command policy: a command matching a destructive
    /// pattern is refused unless `override_safety` is set.
    pub fn check_command(
        &self,
        command: &str,
        override_safety: bool,
    ) -> Result<(), CommandBlocked> {
        if is_dangerous_command(command) && !override_safety {
            tracing::warn!(command = %command, "Blocked dangerous command");
            return Err(CommandBlocked);
        }
        Ok(())
    }
}
