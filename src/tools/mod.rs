//! Sandboxed tools for repository edits
//!
//! Every tool resolves its paths through [`RepoSandbox`] and reports failures
//! as text through [`ToolOutput`]. The registry is the only entry point the
//! agent loop uses; nothing raised inside a handler escapes it.

mod file_ops;
mod listing;
mod sandbox;
mod search;
mod shell;

pub use file_ops::{
    CreateFileTool, DeleteFileTool, PatchFileTool, ReadFileLinesTool, ReadFileTool,
    RenameFileTool, WriteFileTool,
};
pub use listing::{ListDirectoryTool, ListDirectoryTreeTool};
pub use sandbox::RepoSandbox;
pub use search::SearchInFilesTool;
pub use shell::{check_command, RunCommandTool};

use crate::config::ToolsConfig;
use crate::llm::ToolDefinition;
use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// The closed set of tools the model may call
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolKind {
    ListDirectory,
    ListDirectoryTree,
    SearchInFiles,
    ReadFile,
    ReadFileLines,
    WriteFile,
    CreateFile,
    PatchFile,
    DeleteFile,
    RenameFile,
    RunCommand,
}

impl ToolKind {
    pub const ALL: [ToolKind; 11] = [
        ToolKind::ListDirectory,
        ToolKind::ListDirectoryTree,
        ToolKind::SearchInFiles,
        ToolKind::ReadFile,
        ToolKind::ReadFileLines,
        ToolKind::WriteFile,
        ToolKind::CreateFile,
        ToolKind::PatchFile,
        ToolKind::DeleteFile,
        ToolKind::RenameFile,
        ToolKind::RunCommand,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolKind::ListDirectory => "list_directory",
            ToolKind::ListDirectoryTree => "list_directory_tree",
            ToolKind::SearchInFiles => "search_in_files",
            ToolKind::ReadFile => "read_file",
            ToolKind::ReadFileLines => "read_file_lines",
            ToolKind::WriteFile => "write_file",
            ToolKind::CreateFile => "create_file",
            ToolKind::PatchFile => "patch_file",
            ToolKind::DeleteFile => "delete_file",
            ToolKind::RenameFile => "rename_file",
            ToolKind::RunCommand => "run_command",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == name)
    }

    /// Tools whose success is recorded in the change log
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            ToolKind::WriteFile
                | ToolKind::CreateFile
                | ToolKind::PatchFile
                | ToolKind::DeleteFile
                | ToolKind::RenameFile
        )
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}

/// Tool-level failures, reported back to the model as text
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool '{0}'.")]
    UnknownTool(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Path traversal blocked: '{0}' resolves outside the repo.")]
    PathTraversal(String),

    #[error("Path '{0}' does not exist.")]
    NotFound(String),

    #[error("File '{0}' does not exist.")]
    FileNotFound(String),

    #[error("Directory '{0}' does not exist.")]
    DirectoryNotFound(String),

    #[error("'{0}' is not a directory.")]
    NotADirectory(String),

    #[error("'{0}' is not a file.")]
    NotAFile(String),

    #[error("File '{0}' does not exist. Use create_file to create new files.")]
    UseCreate(String),

    #[error("'{0}' already exists. Use write_file to overwrite existing files.")]
    UseWrite(String),

    #[error("'{0}' already exists.")]
    AlreadyExists(String),

    #[error("old_text not found in '{0}'.")]
    PatchNotFound(String),

    #[error("old_text found {count} times in '{path}'. Include more surrounding context so it matches exactly once.")]
    PatchAmbiguous { path: String, count: usize },

    #[error("Invalid line range: {0}")]
    InvalidLineRange(String),

    #[error("start_line {start} is beyond the end of '{path}' ({total} lines).")]
    StartBeyondEnd {
        path: String,
        start: usize,
        total: usize,
    },

    #[error("Invalid regex: {0}")]
    InvalidRegex(String),

    #[error("Invalid file pattern: {0}")]
    InvalidGlob(String),

    #[error("Command blocked by safety rule: {0}")]
    CommandBlocked(String),

    #[error("Command timed out after {0} seconds.")]
    CommandTimeout(u64),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ToolError {
    /// Failures that are not a consequence of the model's input
    pub fn is_unexpected(&self) -> bool {
        matches!(self, ToolError::Io(_) | ToolError::Other(_))
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        ToolError::InvalidInput(e.to_string())
    }
}

/// Result of one tool call as seen by the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutput {
    Success(String),
    Error(String),
}

impl ToolOutput {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutput::Error(_))
    }

    pub fn text(&self) -> &str {
        match self {
            ToolOutput::Success(text) | ToolOutput::Error(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            ToolOutput::Success(text) | ToolOutput::Error(text) => text,
        }
    }
}

/// Trait for tools that can be called by the agent
#[async_trait]
pub trait Tool: Send + Sync {
    fn kind(&self) -> ToolKind;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    fn description(&self) -> &str;

    /// JSON schema for the tool input
    fn parameters(&self) -> Value;

    async fn execute(&self, input: Value) -> Result<String, ToolError>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Dispatch table from tool kind to handler
pub struct ToolRegistry {
    tools: BTreeMap<ToolKind, Arc<dyn Tool>>,
    sandbox: RepoSandbox,
}

impl ToolRegistry {
    /// Empty registry bound to a repository
    pub fn new(sandbox: RepoSandbox) -> Self {
        Self {
            tools: BTreeMap::new(),
            sandbox,
        }
    }

    /// Registry with the full catalogue (minus `run_command` when the shell is disabled)
    pub fn with_defaults(sandbox: RepoSandbox, config: &ToolsConfig) -> Self {
        let mut registry = Self::new(sandbox.clone());

        registry.register(Arc::new(ListDirectoryTool::new(sandbox.clone())));
        registry.register(Arc::new(ListDirectoryTreeTool::new(
            sandbox.clone(),
            config.default_tree_depth,
            config.max_tree_entries,
        )));
        registry.register(Arc::new(SearchInFilesTool::new(
            sandbox.clone(),
            config.max_search_matches,
        )));
        registry.register(Arc::new(ReadFileTool::new(sandbox.clone())));
        registry.register(Arc::new(ReadFileLinesTool::new(sandbox.clone())));
        registry.register(Arc::new(WriteFileTool::new(sandbox.clone())));
        registry.register(Arc::new(CreateFileTool::new(sandbox.clone())));
        registry.register(Arc::new(PatchFileTool::new(sandbox.clone())));
        registry.register(Arc::new(DeleteFileTool::new(sandbox.clone())));
        registry.register(Arc::new(RenameFileTool::new(sandbox.clone())));

        if config.shell_enabled {
            registry.register(Arc::new(RunCommandTool::new(
                sandbox,
                config.command_timeout_secs,
                config.max_command_output_chars,
                config.denied_command_prefixes.clone(),
            )));
        } else {
            tracing::info!("Shell tool disabled by configuration");
        }

        registry
    }

    /// Register a tool, replacing any handler of the same kind
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.kind(), tool);
    }

    pub fn sandbox(&self) -> &RepoSandbox {
        &self.sandbox
    }

    /// Tool schemas in catalogue order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Execute a tool by name; every failure comes back as `ToolOutput::Error`
    pub async fn execute(&self, name: &str, input: Value) -> ToolOutput {
        let tool = match ToolKind::from_name(name).and_then(|kind| self.tools.get(&kind)) {
            Some(tool) => tool,
            None => {
                tracing::warn!("Model requested unknown tool '{}'", name);
                return ToolOutput::Error(format!("Error: {}", ToolError::UnknownTool(name.into())));
            }
        };

        match AssertUnwindSafe(tool.execute(input)).catch_unwind().await {
            Ok(Ok(text)) => ToolOutput::Success(text),
            Ok(Err(e)) if e.is_unexpected() => {
                tracing::error!("Tool '{}' failed: {}", name, e);
                ToolOutput::Error(format!("Error executing {}: {}", name, e))
            }
            Ok(Err(e)) => {
                tracing::debug!("Tool '{}' returned error: {}", name, e);
                ToolOutput::Error(format!("Error: {}", e))
            }
            Err(panic_info) => {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                tracing::error!("Tool '{}' panicked: {}", name, panic_msg);
                ToolOutput::Error(format!("Error executing {}: {}", name, panic_msg))
            }
        }
    }
}
