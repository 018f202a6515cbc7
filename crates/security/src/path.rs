//! Path resolution for containment checks.
//!
//! Candidate paths arrive from the engine as arbitrary strings — relative,
//! dotted, possibly through symlinks, possibly naming files that do not
//! exist yet (writes). Resolution produces one canonical absolute path that
//! the containment check can compare component-wise against the root.

use std::path::{Component, Path, PathBuf};

/// Error returned when a path cannot be resolved or escapes the boundary.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("Path '{path}' is outside the security root {root}")]
    OutsideRoot { path: String, root: String },

    #[error("Failed to resolve path '{path}': {reason}")]
    ResolveFailed { path: String, reason: String },
}

/// Resolve a path to canonical absolute form.
///
/// Relative paths resolve against the process working directory. `.` and
/// `..` segments are collapsed lexically first, then the nearest existing
/// ancestor is canonicalized (resolving symlinked segments) and any
/// not-yet-existing remainder is re-joined. The remainder cannot smuggle
/// `..` back in because normalization already removed every dot segment.
pub fn resolve_absolute(path: &Path) -> Result<PathBuf, PathError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        let cwd = std::env::current_dir().map_err(|e| PathError::ResolveFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        cwd.join(path)
    };

    let normalized = normalize(&absolute);

    if let Ok(canonical) = normalized.canonicalize() {
        return Ok(canonical);
    }

    // The path (or part of it) does not exist yet. Canonicalize the nearest
    // existing ancestor and re-join the remaining segments.
    let mut ancestor = normalized.as_path();
    let mut tail: Vec<&std::ffi::OsStr> = Vec::new();
    while !ancestor.exists() {
        let Some(parent) = ancestor.parent() else {
            break;
        };
        if let Some(name) = ancestor.file_name() {
            tail.push(name);
        }
        ancestor = parent;
    }

    let canonical_ancestor =
        ancestor
            .canonicalize()
            .map_err(|e| PathError::ResolveFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

    Ok(tail
        .iter()
        .rev()
        .fold(canonical_ancestor, |acc, seg| acc.join(seg)))
}

/// Collapse `.` and `..` components lexically.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
