//! Directory listing tools

use super::{RepoSandbox, Tool, ToolError, ToolKind};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

/// Directories that are never useful to the model
const HIDDEN_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    "node_modules",
    ".venv",
    "venv",
    "target",
    ".mypy_cache",
    ".pytest_cache",
    ".tox",
];

pub(crate) fn is_hidden_dir(name: &str) -> bool {
    HIDDEN_DIRS.contains(&name)
}

struct Entry {
    name: String,
    is_dir: bool,
}

/// Entries of one directory, build-artifact dirs removed, sorted by name.
/// Symlinks are reported by their own type and never followed.
fn read_entries(dir: &Path) -> Result<Vec<Entry>, ToolError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type()?.is_dir();
        if is_dir && is_hidden_dir(&name) {
            continue;
        }
        entries.push(Entry { name, is_dir });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

fn check_directory(path: &Path, display: &str) -> Result<(), ToolError> {
    if !path.exists() {
        return Err(ToolError::DirectoryNotFound(display.to_string()));
    }
    if !path.is_dir() {
        return Err(ToolError::NotADirectory(display.to_string()));
    }
    Ok(())
}

/// Tool for listing one directory level
pub struct ListDirectoryTool {
    sandbox: RepoSandbox,
}

impl ListDirectoryTool {
    pub fn new(sandbox: RepoSandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ListDirectory
    }

    fn description(&self) -> &str {
        "List the files and subdirectories of a directory. Use '.' for the repository root."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path relative to the repository root"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        #[derive(Deserialize)]
        struct Params {
            path: String,
        }

        let params: Params = serde_json::from_value(input)?;
        let path = self.sandbox.resolve(&params.path)?;
        check_directory(&path, &params.path)?;

        let lines: Vec<String> = read_entries(&path)?
            .into_iter()
            .map(|e| {
                let tag = if e.is_dir { "[DIR] " } else { "[FILE]" };
                format!("{} {}", tag, e.name)
            })
            .collect();

        if lines.is_empty() {
            Ok("(empty directory)".to_string())
        } else {
            Ok(lines.join("\n"))
        }
    }
}

/// Tool for a recursive ASCII tree view
pub struct ListDirectoryTreeTool {
    sandbox: RepoSandbox,
    default_depth: usize,
    max_entries: usize,
}

impl ListDirectoryTreeTool {
    pub fn new(sandbox: RepoSandbox, default_depth: usize, max_entries: usize) -> Self {
        Self {
            sandbox,
            default_depth,
            max_entries,
        }
    }
}

struct TreeWalk {
    lines: Vec<String>,
    max_entries: usize,
    truncated: bool,
}

impl TreeWalk {
    fn visit(
        &mut self,
        dir: &Path,
        prefix: &str,
        depth: usize,
        max_depth: usize,
    ) -> Result<(), ToolError> {
        let mut entries = read_entries(dir)?;
        // Directories first, each group already sorted by name
        entries.sort_by_key(|e| !e.is_dir);

        let count = entries.len();
        for (i, entry) in entries.into_iter().enumerate() {
            if self.lines.len() >= self.max_entries {
                self.truncated = true;
                return Ok(());
            }

            let last = i + 1 == count;
            let connector = if last { "└── " } else { "├── " };
            let suffix = if entry.is_dir { "/" } else { "" };
            self.lines
                .push(format!("{}{}{}{}", prefix, connector, entry.name, suffix));

            if entry.is_dir && depth < max_depth {
                let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
                self.visit(&dir.join(&entry.name), &child_prefix, depth + 1, max_depth)?;
                if self.truncated {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Tool for ListDirectoryTreeTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ListDirectoryTree
    }

    fn description(&self) -> &str {
        "Show a recursive tree of a directory, directories first. Good for getting an \
         overview of the repository structure."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path relative to the repository root"
                },
                "max_depth": {
                    "type": "integer",
                    "description": format!("How many levels to descend (default {})", self.default_depth)
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        #[derive(Deserialize)]
        struct Params {
            path: String,
            max_depth: Option<usize>,
        }

        let params: Params = serde_json::from_value(input)?;
        let max_depth = params.max_depth.unwrap_or(self.default_depth);
        if max_depth == 0 {
            return Err(ToolError::InvalidInput(
                "max_depth must be at least 1".to_string(),
            ));
        }

        let path = self.sandbox.resolve(&params.path)?;
        check_directory(&path, &params.path)?;

        let mut walk = TreeWalk {
            lines: Vec::new(),
            max_entries: self.max_entries,
            truncated: false,
        };
        walk.visit(&path, "", 1, max_depth)?;

        let mut output = format!("{}/", self.sandbox.display_path(&path));
        for line in &walk.lines {
            output.push('\n');
            output.push_str(line);
        }
        if walk.truncated {
            output.push_str(&format!("\n... (truncated at {} entries)", self.max_entries));
        }
        Ok(output)
    }
}
