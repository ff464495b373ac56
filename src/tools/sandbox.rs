//! Path containment for tool calls
//!
//! The root is canonicalized once. Every tool path is joined to it and
//! normalized lexically, then walked one component at a time: each symlink met
//! on the way is canonicalized and must stay at or below the root. Dangling
//! symlinks are refused since their target cannot be checked.

use super::ToolError;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RepoSandbox {
    root: PathBuf,
}

impl RepoSandbox {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let canonical = fs::canonicalize(root)
            .with_context(|| format!("Repository root {} is not accessible", root.display()))?;
        if !canonical.is_dir() {
            anyhow::bail!("Repository root {} is not a directory", root.display());
        }
        Ok(Self { root: canonical })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a model-supplied path to an absolute path inside the root
    ///
    /// The returned path contains no `.`/`..` components and no symlink that
    /// leads outside the root, so filesystem calls on it stay contained.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        let blocked = || {
            tracing::warn!("Blocked path outside repository: {}", path);
            ToolError::PathTraversal(path.to_string())
        };

        let normalized = normalize_lexically(&self.root.join(path));
        let relative = normalized.strip_prefix(&self.root).map_err(|_| blocked())?;
        let parts: Vec<Component<'_>> = relative.components().collect();

        let mut resolved = self.root.clone();
        for (i, part) in parts.iter().enumerate() {
            let next = resolved.join(part);
            match fs::symlink_metadata(&next) {
                Ok(meta) if meta.file_type().is_symlink() => {
                    let target = fs::canonicalize(&next).map_err(|_| blocked())?;
                    if !target.starts_with(&self.root) {
                        return Err(blocked());
                    }
                    resolved = target;
                }
                Ok(_) => resolved = next,
                Err(_) => {
                    // Nothing below a missing component exists yet
                    resolved = next;
                    resolved.extend(&parts[i + 1..]);
                    break;
                }
            }
        }

        Ok(resolved)
    }

    /// Path relative to the root, with `/` separators, for display
    pub fn display_path(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let text = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if text.is_empty() {
            ".".to_string()
        } else {
            text
        }
    }
}

/// Apply `.` and `..` without touching the filesystem
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
