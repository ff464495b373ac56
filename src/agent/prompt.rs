//! System prompts and first-message builders

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Default system instruction for implementing a ticket
pub const SYSTEM_PROMPT: &str = "\
You are a senior software engineer AI agent. You are given a ticket with requirements, \
and you have access to a code repository via tools.

Your job:
1. First, explore the repository structure using list_directory or list_directory_tree to understand the codebase.
2. Read relevant files to understand the existing code, conventions, and style.
3. Plan your changes based on the ticket requirements.
4. Make the necessary code changes using patch_file, write_file or create_file.
5. After ALL changes are made, respond with a clear summary of what you changed and why.

Rules:
- Be thorough but focused. Only change what is needed to fulfill the ticket requirements.
- Write clean, production-quality code.
- Follow the existing code style and conventions in the repository.
- If you need to add dependencies, mention them in your summary.
- Do NOT make unrelated changes.
- Always explore the repo structure first before making any changes.";

/// System instruction for resolving pull-request review comments
pub const REVIEW_SYSTEM_PROMPT: &str = "\
You are a senior software engineer AI agent. You are resolving review comments \
left on a pull request. You have access to the full repository via tools.

Your job:
1. Read the review comment(s) carefully. Each one may specify a file, a line, \
the surrounding diff context, and what the reviewer wants changed.
2. Explore the repository to understand the codebase context if needed.
3. Make the requested changes using write_file, patch_file, or create_file.
4. After ALL changes are made, respond with a brief summary of what you did \
for each comment.

Rules:
- Be surgical. Only change what the reviewer asked for.
- Do NOT refactor unrelated code.
- Follow the existing code style.
- If a comment is unclear, make your best reasonable interpretation and note it.
- Always read the target file first before modifying it.";

/// A ticket-like task record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ticket {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub acceptance_criteria: Option<String>,
    /// Any other fields, rendered as `name: value`
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.trim().is_empty())
}

fn render_extra(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Array(a) if a.is_empty() => None,
        Value::Object(o) if o.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl Ticket {
    /// Human-readable form used inside the default user prompt
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        if let Some(key) = non_empty(&self.key) {
            parts.push(format!("Ticket ID: {}", key));
        }
        if let Some(summary) = non_empty(&self.summary) {
            parts.push(format!("Title: {}", summary));
        }
        if let Some(description) = non_empty(&self.description) {
            parts.push(format!("Description:\n{}", description));
        }
        if let Some(criteria) = non_empty(&self.acceptance_criteria) {
            parts.push(format!("Acceptance Criteria:\n{}", criteria));
        }
        for (name, value) in &self.extra {
            if let Some(text) = render_extra(value) {
                parts.push(format!("{}: {}", name, text));
            }
        }
        parts.join("\n\n")
    }
}

/// Default first user message for a ticket
pub fn ticket_prompt(ticket: &Ticket) -> String {
    format!(
        "Here is the ticket you need to implement:\n\n---\n{}\n---\n\n\
         The repository is cloned locally. Start by exploring the repository structure, \
         then read relevant files, and make the necessary changes to implement this ticket.",
        ticket.render()
    )
}

/// One pull-request review comment to resolve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewComment {
    pub pr_number: u64,
    #[serde(default)]
    pub pr_title: String,
    #[serde(default)]
    pub user: String,
    pub body: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub line: Option<u64>,
    #[serde(default)]
    pub diff_hunk: Option<String>,
}

impl ReviewComment {
    fn location(&self) -> String {
        match (self.path.as_deref(), self.line) {
            (Some(path), Some(line)) => format!("**File:** `{}` (line {})\n", path, line),
            (Some(path), None) => format!("**File:** `{}`\n", path),
            _ => String::new(),
        }
    }

    fn diff(&self, trailer: &str) -> String {
        match self.diff_hunk.as_deref() {
            Some(hunk) if !hunk.is_empty() => {
                format!("**Diff context:**\n```\n{}\n```\n{}", hunk, trailer)
            }
            _ => String::new(),
        }
    }
}

/// First user message for resolving one or more review comments; `None` for an empty list
pub fn review_prompt(comments: &[ReviewComment]) -> Option<String> {
    match comments {
        [] => None,
        [c] => Some(format!(
            "Please resolve this PR comment on PR #{} (\"{}\").\n\n\
             **Reviewer:** {}\n{}**Comment:** {}\n\n{}\
             Read the relevant code, make the requested change, and confirm what you did.",
            c.pr_number,
            c.pr_title,
            c.user,
            c.location(),
            c.body,
            c.diff("\n"),
        )),
        [first, ..] => {
            let mut parts = vec![format!(
                "Please resolve ALL of the following {} comments on PR #{} (\"{}\").\n",
                comments.len(),
                first.pr_number,
                first.pr_title
            )];
            for (i, c) in comments.iter().enumerate() {
                parts.push(format!(
                    "### Comment {}\n**Reviewer:** {}\n{}**Comment:** {}\n\n{}",
                    i + 1,
                    c.user,
                    c.location(),
                    c.body,
                    c.diff(""),
                ));
            }
            parts.push(
                "Read the relevant files, make ALL requested changes, then provide \
                 a brief summary of what you did for each comment."
                    .to_string(),
            );
            Some(parts.join("\n"))
        }
    }
}
