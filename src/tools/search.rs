//! Regex search across repository files

use super::listing::is_hidden_dir;
use super::{RepoSandbox, Tool, ToolError, ToolKind};
use async_trait::async_trait;
use grep_regex::{RegexMatcher, RegexMatcherBuilder};
use grep_searcher::sinks::Lossy;
use grep_searcher::{BinaryDetection, Searcher, SearcherBuilder};
use ignore::WalkBuilder;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;

/// Tool for case-insensitive regex search with `path:line: text` output
pub struct SearchInFilesTool {
    sandbox: RepoSandbox,
    max_matches: usize,
}

impl SearchInFilesTool {
    pub fn new(sandbox: RepoSandbox, max_matches: usize) -> Self {
        Self {
            sandbox,
            max_matches,
        }
    }
}

struct Matches {
    lines: Vec<String>,
    limit: usize,
    truncated: bool,
}

impl Matches {
    fn search_file(
        &mut self,
        matcher: &RegexMatcher,
        searcher: &mut Searcher,
        path: &Path,
        display: &str,
    ) {
        let result = searcher.search_path(
            matcher,
            path,
            Lossy(|line_number, line| {
                if self.lines.len() >= self.limit {
                    self.truncated = true;
                    return Ok(false);
                }
                self.lines.push(format!(
                    "{}:{}: {}",
                    display,
                    line_number,
                    line.trim_end_matches(['\r', '\n'])
                ));
                Ok(true)
            }),
        );

        if let Err(e) = result {
            tracing::debug!("Skipping {}: {}", path.display(), e);
        }
    }
}

#[async_trait]
impl Tool for SearchInFilesTool {
    fn kind(&self) -> ToolKind {
        ToolKind::SearchInFiles
    }

    fn description(&self) -> &str {
        "Search file contents with a regular expression (case-insensitive). Returns \
         matching lines as path:line: text. Optionally restrict to a subdirectory \
         and to file names matching a glob such as '*.rs'."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regular expression to search for"
                },
                "path": {
                    "type": "string",
                    "description": "Directory or file to search, relative to the repository root (default '.')"
                },
                "file_pattern": {
                    "type": "string",
                    "description": "Optional glob matched against file names, e.g. '*.py'"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        #[derive(Deserialize)]
        struct Params {
            pattern: String,
            path: Option<String>,
            file_pattern: Option<String>,
        }

        let params: Params = serde_json::from_value(input)?;

        let matcher = RegexMatcherBuilder::new()
            .case_insensitive(true)
            .build(&params.pattern)
            .map_err(|e| ToolError::InvalidRegex(e.to_string()))?;

        let file_filter = params
            .file_pattern
            .as_deref()
            .map(glob::Pattern::new)
            .transpose()
            .map_err(|e| ToolError::InvalidGlob(e.to_string()))?;

        let scope = params.path.unwrap_or_else(|| ".".to_string());
        let search_path = self.sandbox.resolve(&scope)?;
        if !search_path.exists() {
            return Err(ToolError::NotFound(scope));
        }

        let mut searcher = SearcherBuilder::new()
            .line_number(true)
            .binary_detection(BinaryDetection::quit(b'\x00'))
            .build();

        let mut matches = Matches {
            lines: Vec::new(),
            limit: self.max_matches,
            truncated: false,
        };

        if search_path.is_file() {
            let display = self.sandbox.display_path(&search_path);
            matches.search_file(&matcher, &mut searcher, &search_path, &display);
        } else {
            let walker = WalkBuilder::new(&search_path)
                .standard_filters(false)
                .follow_links(false)
                .sort_by_file_name(|a, b| a.cmp(b))
                .filter_entry(|entry| {
                    let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                    !(is_dir && is_hidden_dir(&entry.file_name().to_string_lossy()))
                })
                .build();

            for entry in walker.filter_map(|e| e.ok()) {
                if matches.truncated {
                    break;
                }
                if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                    continue;
                }

                if let Some(ref filter) = file_filter {
                    let file_name = entry.file_name().to_string_lossy();
                    if !filter.matches(&file_name) {
                        continue;
                    }
                }

                let display = self.sandbox.display_path(entry.path());
                matches.search_file(&matcher, &mut searcher, entry.path(), &display);
            }
        }

        if matches.lines.is_empty() {
            return Ok("No matches found.".to_string());
        }

        let mut output = matches.lines.join("\n");
        if matches.truncated {
            output.push_str(&format!(
                "\n... (results truncated at {} matches)",
                self.max_matches
            ));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, RepoSandbox) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("node_modules/dep")).unwrap();
        fs::write(root.join("src/app.py"), "import os\nDEBUG = True\n").unwrap();
        fs::write(root.join("src/notes.md"), "debug notes\n").unwrap();
        fs::write(root.join("node_modules/dep/index.js"), "debug\n").unwrap();
        let sandbox = RepoSandbox::new(root).unwrap();
        (dir, sandbox)
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_skips_vendor_dirs() {
        let (_dir, sandbox) = setup();
        let out = SearchInFilesTool::new(sandbox, 100)
            .execute(json!({"pattern": "debug"}))
            .await
            .unwrap();
        assert_eq!(out, "src/app.py:2: DEBUG = True\nsrc/notes.md:1: debug notes");
    }

    #[tokio::test]
    async fn test_search_with_file_pattern_and_scope() {
        let (_dir, sandbox) = setup();
        let tool = SearchInFilesTool::new(sandbox, 100);

        let out = tool
            .execute(json!({"pattern": "debug", "path": "src", "file_pattern": "*.md"}))
            .await
            .unwrap();
        assert_eq!(out, "src/notes.md:1: debug notes");

        let out = tool
            .execute(json!({"pattern": "import", "path": "src/app.py"}))
            .await
            .unwrap();
        assert_eq!(out, "src/app.py:1: import os");
    }

    #[tokio::test]
    async fn test_search_no_matches_and_errors() {
        let (_dir, sandbox) = setup();
        let tool = SearchInFilesTool::new(sandbox, 100);

        let out = tool.execute(json!({"pattern": "zzz_absent"})).await.unwrap();
        assert_eq!(out, "No matches found.");

        let err = tool.execute(json!({"pattern": "("})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidRegex(_)));

        let err = tool
            .execute(json!({"pattern": "x", "path": "nowhere"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_search_truncates_at_limit() {
        let dir = TempDir::new().unwrap();
        let body: String = (0..10).map(|i| format!("hit {i}\n")).collect();
        fs::write(dir.path().join("many.txt"), body).unwrap();
        let sandbox = RepoSandbox::new(dir.path()).unwrap();

        let out = SearchInFilesTool::new(sandbox, 3)
            .execute(json!({"pattern": "hit"}))
            .await
            .unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "many.txt:1: hit 0");
        assert_eq!(lines[3], "... (results truncated at 3 matches)");
    }
}
