//! Audit trail of successful mutations

use crate::tools::ToolKind;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Renamed { from: String },
}

/// One successful mutation; for renames `path` is the destination
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChangeRecord {
    pub path: String,
    #[serde(flatten)]
    pub kind: ChangeKind,
}

impl ChangeRecord {
    pub fn created(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Created,
        }
    }

    pub fn modified(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Modified,
        }
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Deleted,
        }
    }

    pub fn renamed(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            path: to.into(),
            kind: ChangeKind::Renamed { from: from.into() },
        }
    }

    /// Record for a tool call that succeeded; `None` for read-only tools
    pub fn from_tool_call(kind: ToolKind, input: &Value) -> Option<Self> {
        let field = |name: &str| input.get(name).and_then(Value::as_str);
        match kind {
            ToolKind::CreateFile => field("path").map(Self::created),
            ToolKind::WriteFile | ToolKind::PatchFile => field("path").map(Self::modified),
            ToolKind::DeleteFile => field("path").map(Self::deleted),
            ToolKind::RenameFile => Some(Self::renamed(field("old_path")?, field("new_path")?)),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ChangeKind::Created | ChangeKind::Modified => write!(f, "{}", self.path),
            ChangeKind::Deleted => write!(f, "(deleted) {}", self.path),
            ChangeKind::Renamed { from } => write!(f, "(renamed) {} → {}", from, self.path),
        }
    }
}

/// Ordered change records, duplicates kept
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChangeLog {
    records: Vec<ChangeRecord>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ChangeRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First occurrence of each record, in original order
    pub fn deduplicated(&self) -> Vec<ChangeRecord> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(*r))
            .cloned()
            .collect()
    }
}

impl From<Vec<ChangeRecord>> for ChangeLog {
    fn from(records: Vec<ChangeRecord>) -> Self {
        Self { records }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_tool_call() {
        assert_eq!(
            ChangeRecord::from_tool_call(ToolKind::CreateFile, &json!({"path": "a.rs"})),
            Some(ChangeRecord::created("a.rs"))
        );
        assert_eq!(
            ChangeRecord::from_tool_call(ToolKind::PatchFile, &json!({"path": "a.rs"})),
            Some(ChangeRecord::modified("a.rs"))
        );
        assert_eq!(
            ChangeRecord::from_tool_call(
                ToolKind::RenameFile,
                &json!({"old_path": "a.rs", "new_path": "b.rs"})
            ),
            Some(ChangeRecord::renamed("a.rs", "b.rs"))
        );
        assert_eq!(
            ChangeRecord::from_tool_call(ToolKind::ReadFile, &json!({"path": "a.rs"})),
            None
        );
        assert_eq!(
            ChangeRecord::from_tool_call(ToolKind::RunCommand, &json!({"command": "ls"})),
            None
        );
    }

    #[test]
    fn test_display_legacy_form() {
        assert_eq!(ChangeRecord::modified("src/a.rs").to_string(), "src/a.rs");
        assert_eq!(ChangeRecord::deleted("old.txt").to_string(), "(deleted) old.txt");
        assert_eq!(
            ChangeRecord::renamed("a.rs", "b.rs").to_string(),
            "(renamed) a.rs → b.rs"
        );
    }

    #[test]
    fn test_deduplicated_keeps_first_occurrence_order() {
        let log = ChangeLog::from(vec![
            ChangeRecord::created("a"),
            ChangeRecord::modified("a"),
            ChangeRecord::modified("b"),
            ChangeRecord::modified("a"),
            ChangeRecord::modified("b"),
        ]);

        assert_eq!(log.len(), 5);
        assert_eq!(
            log.deduplicated(),
            vec![
                ChangeRecord::created("a"),
                ChangeRecord::modified("a"),
                ChangeRecord::modified("b"),
            ]
        );
    }

    #[test]
    fn test_serialization_is_flat() {
        let value = serde_json::to_value(ChangeRecord::renamed("a", "b")).unwrap();
        assert_eq!(value, json!({"path": "b", "kind": "renamed", "from": "a"}));
    }
}
