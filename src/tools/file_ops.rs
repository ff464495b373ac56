//! File read/write tools

use super::{RepoSandbox, Tool, ToolError, ToolKind};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;

fn read_lossy(path: &std::path::Path) -> Result<String, ToolError> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Start offsets of non-overlapping occurrences of `needle`
fn find_occurrences(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    let mut found = Vec::new();
    let mut pos = 0;
    while pos + needle.len() <= haystack.len() {
        if haystack[pos..].starts_with(needle) {
            found.push(pos);
            pos += needle.len();
        } else {
            pos += 1;
        }
    }
    found
}

/// Tool for reading a whole file
pub struct ReadFileTool {
    sandbox: RepoSandbox,
}

impl ReadFileTool {
    pub fn new(sandbox: RepoSandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ReadFile
    }

    fn description(&self) -> &str {
        "Read the full contents of a file in the repository."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the repository root"
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

        if !path.exists() {
            return Err(ToolError::FileNotFound(params.path));
        }
        if !path.is_file() {
            return Err(ToolError::NotAFile(params.path));
        }

        let content = read_lossy(&path)?;
        if content.is_empty() {
            Ok("(file is empty)".to_string())
        } else {
            Ok(content)
        }
    }
}

/// Tool for reading an inclusive, 1-indexed line range
pub struct ReadFileLinesTool {
    sandbox: RepoSandbox,
}

impl ReadFileLinesTool {
    pub fn new(sandbox: RepoSandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ReadFileLinesTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ReadFileLines
    }

    fn description(&self) -> &str {
        "Read a range of lines from a file. Lines are 1-indexed and the range is \
         inclusive; each line is prefixed with its line number. Use this for large files."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the repository root"
                },
                "start_line": {
                    "type": "integer",
                    "description": "First line to read (1-indexed)"
                },
                "end_line": {
                    "type": "integer",
                    "description": "Last line to read (inclusive); clamped to the file length"
                }
            },
            "required": ["path", "start_line", "end_line"]
        })
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        #[derive(Deserialize)]
        struct Params {
            path: String,
            start_line: usize,
            end_line: usize,
        }

        let params: Params = serde_json::from_value(input)?;

        // Range checks never touch the filesystem
        if params.start_line < 1 {
            return Err(ToolError::InvalidLineRange(
                "start_line must be at least 1".to_string(),
            ));
        }
        if params.end_line < params.start_line {
            return Err(ToolError::InvalidLineRange(format!(
                "end_line ({}) is before start_line ({})",
                params.end_line, params.start_line
            )));
        }

        let path = self.sandbox.resolve(&params.path)?;
        if !path.exists() {
            return Err(ToolError::FileNotFound(params.path));
        }
        if !path.is_file() {
            return Err(ToolError::NotAFile(params.path));
        }

        let content = read_lossy(&path)?;
        let lines: Vec<&str> = content.lines().collect();
        if params.start_line > lines.len() {
            return Err(ToolError::StartBeyondEnd {
                path: params.path,
                start: params.start_line,
                total: lines.len(),
            });
        }

        let end = params.end_line.min(lines.len());
        let output = lines[params.start_line - 1..end]
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{}: {}", params.start_line + i, line))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(output)
    }
}

/// Tool for overwriting an existing file
pub struct WriteFileTool {
    sandbox: RepoSandbox,
}

impl WriteFileTool {
    pub fn new(sandbox: RepoSandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn kind(&self) -> ToolKind {
        ToolKind::WriteFile
    }

    fn description(&self) -> &str {
        "Overwrite an existing file with new content. Fails if the file does not \
         exist; use create_file for new files."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the repository root"
                },
                "content": {
                    "type": "string",
                    "description": "The complete new file content"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        #[derive(Deserialize)]
        struct Params {
            path: String,
            content: String,
        }

        let params: Params = serde_json::from_value(input)?;
        let path = self.sandbox.resolve(&params.path)?;

        if !path.exists() {
            return Err(ToolError::UseCreate(params.path));
        }
        if !path.is_file() {
            return Err(ToolError::NotAFile(params.path));
        }

        fs::write(&path, &params.content)?;
        Ok(format!("Successfully wrote to {}", params.path))
    }
}

/// Tool for creating a new file, including missing parent directories
pub struct CreateFileTool {
    sandbox: RepoSandbox,
}

impl CreateFileTool {
    pub fn new(sandbox: RepoSandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for CreateFileTool {
    fn kind(&self) -> ToolKind {
        ToolKind::CreateFile
    }

    fn description(&self) -> &str {
        "Create a new file. Parent directories are created as needed. Fails if the \
         path already exists; use write_file to overwrite."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the repository root"
                },
                "content": {
                    "type": "string",
                    "description": "Content of the new file"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        #[derive(Deserialize)]
        struct Params {
            path: String,
            content: String,
        }

        let params: Params = serde_json::from_value(input)?;
        let path = self.sandbox.resolve(&params.path)?;

        if path.exists() {
            return Err(ToolError::UseWrite(params.path));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &params.content)?;
        Ok(format!("Successfully created {}", params.path))
    }
}

/// Tool for replacing exactly one occurrence of a snippet
pub struct PatchFileTool {
    sandbox: RepoSandbox,
}

impl PatchFileTool {
    pub fn new(sandbox: RepoSandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for PatchFileTool {
    fn kind(&self) -> ToolKind {
        ToolKind::PatchFile
    }

    fn description(&self) -> &str {
        "Replace a snippet in a file. old_text must match the file contents exactly \
         and appear exactly once; include surrounding lines to disambiguate."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the repository root"
                },
                "old_text": {
                    "type": "string",
                    "description": "Exact text to replace (must be unique in the file)"
                },
                "new_text": {
                    "type": "string",
                    "description": "Replacement text"
                }
            },
            "required": ["path", "old_text", "new_text"]
        })
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        #[derive(Deserialize)]
        struct Params {
            path: String,
            old_text: String,
            new_text: String,
        }

        let params: Params = serde_json::from_value(input)?;
        if params.old_text.is_empty() {
            return Err(ToolError::InvalidInput(
                "old_text must not be empty".to_string(),
            ));
        }

        let path = self.sandbox.resolve(&params.path)?;
        if !path.exists() {
            return Err(ToolError::FileNotFound(params.path));
        }
        if !path.is_file() {
            return Err(ToolError::NotAFile(params.path));
        }

        // Bytes outside the replaced span are written back untouched
        let content = fs::read(&path)?;
        let old = params.old_text.as_bytes();
        match find_occurrences(&content, old)[..] {
            [] => Err(ToolError::PatchNotFound(params.path)),
            [at] => {
                let mut patched = Vec::with_capacity(content.len() + params.new_text.len());
                patched.extend_from_slice(&content[..at]);
                patched.extend_from_slice(params.new_text.as_bytes());
                patched.extend_from_slice(&content[at + old.len()..]);
                fs::write(&path, patched)?;
                Ok(format!("Successfully patched {}", params.path))
            }
            ref all => Err(ToolError::PatchAmbiguous {
                path: params.path,
                count: all.len(),
            }),
        }
    }
}

/// Tool for deleting a file
pub struct DeleteFileTool {
    sandbox: RepoSandbox,
}

impl DeleteFileTool {
    pub fn new(sandbox: RepoSandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn kind(&self) -> ToolKind {
        ToolKind::DeleteFile
    }

    fn description(&self) -> &str {
        "Delete a single file. Directories cannot be deleted."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the repository root"
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

        if !path.exists() {
            return Err(ToolError::FileNotFound(params.path));
        }
        if !path.is_file() {
            return Err(ToolError::NotAFile(params.path));
        }

        fs::remove_file(&path)?;
        Ok(format!("Successfully deleted {}", params.path))
    }
}

/// Tool for moving a file within the repository
pub struct RenameFileTool {
    sandbox: RepoSandbox,
}

impl RenameFileTool {
    pub fn new(sandbox: RepoSandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for RenameFileTool {
    fn kind(&self) -> ToolKind {
        ToolKind::RenameFile
    }

    fn description(&self) -> &str {
        "Rename or move a file. Destination parent directories are created as needed; \
         the destination must not already exist."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "old_path": {
                    "type": "string",
                    "description": "Current file path relative to the repository root"
                },
                "new_path": {
                    "type": "string",
                    "description": "New file path relative to the repository root"
                }
            },
            "required": ["old_path", "new_path"]
        })
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        #[derive(Deserialize)]
        struct Params {
            old_path: String,
            new_path: String,
        }

        let params: Params = serde_json::from_value(input)?;
        let old = self.sandbox.resolve(&params.old_path)?;
        let new = self.sandbox.resolve(&params.new_path)?;

        if !old.exists() {
            return Err(ToolError::FileNotFound(params.old_path));
        }
        if !old.is_file() {
            return Err(ToolError::NotAFile(params.old_path));
        }
        if new.exists() {
            return Err(ToolError::AlreadyExists(params.new_path));
        }

        if let Some(parent) = new.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&old, &new)?;
        Ok(format!(
            "Successfully renamed {} to {}",
            params.old_path, params.new_path
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, RepoSandbox) {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {\n    old();\n}\n").unwrap();
        let sandbox = RepoSandbox::new(dir.path()).unwrap();
        (dir, sandbox)
    }

    #[tokio::test]
    async fn test_read_file() {
        let (dir, sandbox) = setup();
        let tool = ReadFileTool::new(sandbox);

        let content = tool.execute(json!({"path": "src/main.rs"})).await.unwrap();
        assert!(content.contains("old();"));

        fs::write(dir.path().join("empty.txt"), "").unwrap();
        let content = tool.execute(json!({"path": "empty.txt"})).await.unwrap();
        assert_eq!(content, "(file is empty)");
    }

    #[tokio::test]
    async fn test_read_file_invalid_utf8_is_lossy() {
        let (dir, sandbox) = setup();
        fs::write(dir.path().join("bin.dat"), [0x66, 0x6f, 0xff, 0x6f]).unwrap();

        let content = ReadFileTool::new(sandbox)
            .execute(json!({"path": "bin.dat"}))
            .await
            .unwrap();
        assert_eq!(content, "fo\u{FFFD}o");
    }

    #[tokio::test]
    async fn test_read_file_errors() {
        let (_dir, sandbox) = setup();
        let tool = ReadFileTool::new(sandbox);

        let err = tool.execute(json!({"path": "nope.rs"})).await.unwrap_err();
        assert_eq!(err.to_string(), "File 'nope.rs' does not exist.");

        let err = tool.execute(json!({"path": "src"})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotAFile(_)));
    }

    #[tokio::test]
    async fn test_read_file_lines_numbers_and_clamps() {
        let (dir, sandbox) = setup();
        fs::write(dir.path().join("five.txt"), "a\nb\nc\nd\ne\n").unwrap();
        let tool = ReadFileLinesTool::new(sandbox);

        let out = tool
            .execute(json!({"path": "five.txt", "start_line": 2, "end_line": 3}))
            .await
            .unwrap();
        assert_eq!(out, "2: b\n3: c");

        let out = tool
            .execute(json!({"path": "five.txt", "start_line": 4, "end_line": 100}))
            .await
            .unwrap();
        assert_eq!(out, "4: d\n5: e");

        let err = tool
            .execute(json!({"path": "five.txt", "start_line": 6, "end_line": 10}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::StartBeyondEnd { total: 5, .. }));
    }

    #[tokio::test]
    async fn test_read_file_lines_range_checked_before_filesystem() {
        let (_dir, sandbox) = setup();
        let tool = ReadFileLinesTool::new(sandbox);

        // The file does not exist, so only a range error proves ordering
        let err = tool
            .execute(json!({"path": "missing.txt", "start_line": 5, "end_line": 3}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidLineRange(_)));

        let err = tool
            .execute(json!({"path": "missing.txt", "start_line": 0, "end_line": 3}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidLineRange(_)));
    }

    #[tokio::test]
    async fn test_write_requires_existing_file() {
        let (dir, sandbox) = setup();
        let tool = WriteFileTool::new(sandbox);

        let err = tool
            .execute(json!({"path": "new.rs", "content": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::UseCreate(_)));
        assert!(!dir.path().join("new.rs").exists());

        let out = tool
            .execute(json!({"path": "src/main.rs", "content": "fn main() {}\n"}))
            .await
            .unwrap();
        assert_eq!(out, "Successfully wrote to src/main.rs");
        assert_eq!(
            fs::read_to_string(dir.path().join("src/main.rs")).unwrap(),
            "fn main() {}\n"
        );
    }

    #[tokio::test]
    async fn test_create_makes_parents_and_refuses_existing() {
        let (dir, sandbox) = setup();
        let tool = CreateFileTool::new(sandbox);

        let out = tool
            .execute(json!({"path": "docs/guide/intro.md", "content": "# Intro\n"}))
            .await
            .unwrap();
        assert_eq!(out, "Successfully created docs/guide/intro.md");
        assert!(dir.path().join("docs/guide/intro.md").is_file());

        let err = tool
            .execute(json!({"path": "src/main.rs", "content": ""}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::UseWrite(_)));
        assert!(err.to_string().contains("Use write_file"));
    }

    #[tokio::test]
    async fn test_patch_replaces_unique_snippet() {
        let (dir, sandbox) = setup();
        let tool = PatchFileTool::new(sandbox);

        let out = tool
            .execute(json!({"path": "src/main.rs", "old_text": "old();", "new_text": "new();"}))
            .await
            .unwrap();
        assert_eq!(out, "Successfully patched src/main.rs");
        assert_eq!(
            fs::read_to_string(dir.path().join("src/main.rs")).unwrap(),
            "fn main() {\n    new();\n}\n"
        );
    }

    #[tokio::test]
    async fn test_patch_keeps_non_utf8_bytes_outside_the_match() {
        let (dir, sandbox) = setup();
        let tool = PatchFileTool::new(sandbox);
        let file = dir.path().join("latin1.cfg");
        fs::write(&file, b"a\xff\nkey").unwrap();

        let out = tool
            .execute(json!({"path": "latin1.cfg", "old_text": "key", "new_text": "KEY"}))
            .await
            .unwrap();
        assert_eq!(out, "Successfully patched latin1.cfg");
        assert_eq!(fs::read(&file).unwrap(), b"a\xff\nKEY".to_vec());
    }

    #[test]
    fn test_find_occurrences_does_not_overlap() {
        assert_eq!(find_occurrences(b"aaa", b"aa"), vec![0]);
        assert_eq!(find_occurrences(b"abab", b"ab"), vec![0, 2]);
        assert!(find_occurrences(b"ab", b"abc").is_empty());
    }

    #[tokio::test]
    async fn test_patch_rejects_missing_and_empty_snippets() {
        let (_dir, sandbox) = setup();
        let tool = PatchFileTool::new(sandbox);

        let err = tool
            .execute(json!({"path": "src/main.rs", "old_text": "absent", "new_text": ""}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PatchNotFound(_)));

        let err = tool
            .execute(json!({"path": "src/main.rs", "old_text": "", "new_text": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_delete_file() {
        let (dir, sandbox) = setup();
        let tool = DeleteFileTool::new(sandbox);

        let err = tool.execute(json!({"path": "src"})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotAFile(_)));

        let out = tool.execute(json!({"path": "src/main.rs"})).await.unwrap();
        assert_eq!(out, "Successfully deleted src/main.rs");
        assert!(!dir.path().join("src/main.rs").exists());

        let err = tool.execute(json!({"path": "src/main.rs"})).await.unwrap_err();
        assert!(matches!(err, ToolError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_rename_file() {
        let (dir, sandbox) = setup();
        fs::write(dir.path().join("taken.rs"), "").unwrap();
        let tool = RenameFileTool::new(sandbox);

        let err = tool
            .execute(json!({"old_path": "src/main.rs", "new_path": "taken.rs"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::AlreadyExists(_)));

        let out = tool
            .execute(json!({"old_path": "src/main.rs", "new_path": "bin/app/main.rs"}))
            .await
            .unwrap();
        assert_eq!(out, "Successfully renamed src/main.rs to bin/app/main.rs");
        assert!(dir.path().join("bin/app/main.rs").is_file());
        assert!(!dir.path().join("src/main.rs").exists());

        let err = tool
            .execute(json!({"old_path": "src", "new_path": "lib"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotAFile(_)));
    }
}
