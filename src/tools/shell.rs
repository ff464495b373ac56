//! Shell command execution tool
//!
//! The deny-list is pattern matching over each segment of a compound command.
//! It stops the obvious destructive calls; it is not an isolation boundary.

use super::{RepoSandbox, Tool, ToolError, ToolKind};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

/// Destructive commands refused without spawning a process
static DENIED_COMMANDS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (
            r"^(?:sudo\s+)?rm\s+(?:-\S+\s+)*-[a-zA-Z]*[rR][a-zA-Z]*(?:\s+-\S+)*\s+(?:/|/\*|~|~/|\$HOME|\*|\.|\./|\.\.|\.\./)(?:\s|$)",
            "recursive rm of a top-level path",
        ),
        (
            r"^git\s+push\b.*(?:\s--force(?:-with-lease)?\b|\s-[a-zA-Z]*f\b|\s\+\S+)",
            "git push --force",
        ),
        (r"^git\s+reset\b.*\s--hard\b", "git reset --hard"),
        (r"^git\s+(?:filter-branch|filter-repo)\b", "git history rewrite"),
        (r"^git\s+rebase\b", "git rebase"),
        (r"^git\s+commit\b.*\s--amend\b", "git commit --amend"),
        (r"^git\s+clean\b.*\s-[a-zA-Z]*f", "git clean -f"),
        (r"^(?:sudo\s+)?mkfs\S*\b", "mkfs"),
        (r"^(?:sudo\s+)?dd\s+.*\bof=/dev/", "dd to a device"),
        (
            r"^(?:sudo\s+)?(?:shutdown|reboot|halt|poweroff)\b",
            "shutdown/reboot",
        ),
    ]
    .into_iter()
    .map(|(pattern, label)| (Regex::new(pattern).expect("valid deny-list pattern"), label))
    .collect()
});

static SEGMENT_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&&|\|\||;|\||\n").expect("valid separator pattern"));

static FORK_BOMB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}").expect("valid fork bomb pattern"));

/// Check a command line against the deny-list and extra literal prefixes
pub fn check_command(command: &str, extra_prefixes: &[String]) -> Result<(), ToolError> {
    if FORK_BOMB.is_match(command) {
        return Err(ToolError::CommandBlocked("fork bomb".to_string()));
    }

    for segment in SEGMENT_SPLIT.split(command) {
        let segment = segment.split_whitespace().collect::<Vec<_>>().join(" ");
        if segment.is_empty() {
            continue;
        }

        if let Some((_, label)) = DENIED_COMMANDS.iter().find(|(re, _)| re.is_match(&segment)) {
            return Err(ToolError::CommandBlocked(label.to_string()));
        }

        if let Some(prefix) = extra_prefixes
            .iter()
            .find(|p| !p.trim().is_empty() && segment.starts_with(p.trim()))
        {
            return Err(ToolError::CommandBlocked(prefix.trim().to_string()));
        }
    }
    Ok(())
}

/// Truncate to at most `max_chars` characters, appending a marker when cut
fn truncate_output(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!(
            "{}\n... (output truncated at {} characters)",
            &text[..byte_idx],
            max_chars
        ),
        None => text,
    }
}

/// Drain a pipe to the end, keeping at most `limit` bytes
async fn read_limited<R: AsyncRead + Unpin>(
    mut reader: R,
    limit: usize,
) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let keep = n.min(limit.saturating_sub(buf.len()));
        buf.extend_from_slice(&chunk[..keep]);
    }
    Ok(buf)
}

/// Kill the shell and everything it started
async fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            let group = format!("-{}", pid);
            let result = Command::new("kill")
                .args(["-KILL", "--", group.as_str()])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            if let Err(e) = result {
                tracing::debug!("Failed to kill process group {}: {}", pid, e);
            }
        }
    }
    if let Err(e) = child.kill().await {
        tracing::debug!("Failed to kill command: {}", e);
    }
}

/// Tool for running a shell command at the repository root
pub struct RunCommandTool {
    sandbox: RepoSandbox,
    timeout_secs: u64,
    max_output_chars: usize,
    denied_prefixes: Vec<String>,
}

impl RunCommandTool {
    pub fn new(
        sandbox: RepoSandbox,
        timeout_secs: u64,
        max_output_chars: usize,
        denied_prefixes: Vec<String>,
    ) -> Self {
        Self {
            sandbox,
            timeout_secs,
            max_output_chars,
            denied_prefixes,
        }
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    fn kind(&self) -> ToolKind {
        ToolKind::RunCommand
    }

    fn description(&self) -> &str {
        "Run a shell command from the repository root, e.g. to build or run tests. \
         Returns stdout, stderr and the exit code. Destructive git and filesystem \
         commands are refused."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": format!(
                        "Shell command to execute (times out after {} seconds)",
                        self.timeout_secs
                    )
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        #[derive(Deserialize)]
        struct Params {
            command: String,
        }

        let params: Params = serde_json::from_value(input)?;

        if let Err(e) = check_command(&params.command, &self.denied_prefixes) {
            tracing::warn!("Blocked command: {}", params.command);
            return Err(e);
        }

        let (shell, shell_arg) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };

        tracing::debug!("Running command: {}", params.command);
        let mut command = Command::new(shell);
        command
            .arg(shell_arg)
            .arg(&params.command)
            .current_dir(self.sandbox.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group so a timeout takes down pipelines and background jobs too
        #[cfg(unix)]
        {
            command.process_group(0);
        }

        let mut child = command.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("stderr was not piped"))?;

        // Enough bytes to decode one character past the cap
        let byte_limit = self.max_output_chars.saturating_mul(4).saturating_add(4);
        let mut stdout_task = tokio::spawn(read_limited(stdout, byte_limit));
        let mut stderr_task = tokio::spawn(read_limited(stderr, byte_limit));

        let finished = tokio::time::timeout(Duration::from_secs(self.timeout_secs), async {
            let status = child.wait().await?;
            let stdout = (&mut stdout_task).await.map_err(anyhow::Error::from)??;
            let stderr = (&mut stderr_task).await.map_err(anyhow::Error::from)??;
            Ok::<_, ToolError>((status, stdout, stderr))
        })
        .await;

        let (status, stdout, stderr) = match finished {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    "Command timed out after {}s: {}",
                    self.timeout_secs,
                    params.command
                );
                kill_process_group(&mut child).await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(ToolError::CommandTimeout(self.timeout_secs));
            }
        };

        let stdout = String::from_utf8_lossy(&stdout);
        let stderr = String::from_utf8_lossy(&stderr);

        let mut body = String::new();
        body.push_str(&stdout);
        if !stderr.is_empty() {
            if !body.is_empty() {
                body.push('\n');
            }
            body.push_str("--- stderr ---\n");
            body.push_str(&stderr);
        }
        if body.is_empty() {
            body.push_str("(no output)");
        }

        let mut text = truncate_output(body, self.max_output_chars);
        match status.code() {
            Some(code) => text.push_str(&format!("\nExit code: {}", code)),
            None => text.push_str("\nExit code: none (terminated by signal)"),
        }
        Ok(text)
    }
}
