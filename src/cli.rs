//! Command handlers for the repo-agent binary

use anyhow::{Context, Result};
use repo_agent::agent::prompt::{review_prompt, REVIEW_SYSTEM_PROMPT};
use repo_agent::agent::{AgentOutcome, ChangeAgent, ReviewComment, RunStatus, TaskInput, Ticket};
use repo_agent::config::Config;
use repo_agent::llm;
use repo_agent::tools::{RepoSandbox, ToolOutput, ToolRegistry};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            let mut config = Config::load_from(path)?;
            config.apply_env_overrides();
            Ok(config)
        }
        None => Config::load(),
    }
}

/// Where the first user message comes from
pub enum TaskSource {
    Prompt(String),
    Ticket(Ticket),
    Review(Vec<ReviewComment>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReviewFile {
    Many(Vec<ReviewComment>),
    One(ReviewComment),
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

impl TaskSource {
    pub fn from_args(
        prompt: Option<String>,
        ticket: Option<PathBuf>,
        review: Option<PathBuf>,
    ) -> Result<Self> {
        match (prompt, ticket, review) {
            (Some(prompt), None, None) => Ok(TaskSource::Prompt(prompt)),
            (None, Some(path), None) => Ok(TaskSource::Ticket(read_json(&path)?)),
            (None, None, Some(path)) => {
                let comments = match read_json::<ReviewFile>(&path)? {
                    ReviewFile::Many(comments) => comments,
                    ReviewFile::One(comment) => vec![comment],
                };
                if comments.is_empty() {
                    anyhow::bail!("{} contains no review comments", path.display());
                }
                Ok(TaskSource::Review(comments))
            }
            _ => anyhow::bail!("Exactly one of --prompt, --ticket or --review is required"),
        }
    }
}

pub struct RunOptions {
    pub repo: PathBuf,
    pub task: TaskSource,
    pub system_prompt: Option<PathBuf>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_rounds: Option<usize>,
    pub json: bool,
}

pub async fn run_agent(config: &Config, options: RunOptions) -> Result<()> {
    let sandbox = RepoSandbox::new(&options.repo)?;
    let tools = ToolRegistry::with_defaults(sandbox, &config.tools);
    tracing::info!("Repository root: {}", tools.sandbox().root().display());
    let provider = llm::create_provider(
        config,
        options.provider.as_deref(),
        options.model.as_deref(),
    )?;

    let (task, default_system) = match options.task {
        TaskSource::Prompt(prompt) => (TaskInput::Prompt(prompt), None),
        TaskSource::Ticket(ticket) => (TaskInput::Ticket(ticket), None),
        TaskSource::Review(comments) => {
            let prompt = review_prompt(&comments).context("No review comments to resolve")?;
            (TaskInput::Prompt(prompt), Some(REVIEW_SYSTEM_PROMPT))
        }
    };

    let mut agent = ChangeAgent::new(provider, tools)
        .with_max_rounds(options.max_rounds.unwrap_or(config.agent.max_rounds));
    if let Some(path) = options.system_prompt {
        let prompt = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read system prompt {}", path.display()))?;
        agent = agent.with_system_prompt(prompt);
    } else if let Some(prompt) = default_system {
        agent = agent.with_system_prompt(prompt);
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::SeqCst);
        })
        .context("Failed to install Ctrl+C handler")?;
    }

    let outcome = match agent
        .run_with_interrupt(task, || interrupted.load(Ordering::SeqCst))
        .await
    {
        Ok(outcome) => outcome,
        Err(e) if e.is_retryable() => {
            return Err(anyhow::Error::new(e)
                .context("Model endpoint is temporarily unavailable; the run can be retried"))
        }
        Err(e) => return Err(e.into()),
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn print_outcome(outcome: &AgentOutcome) {
    println!("{}", outcome.summary);
    println!();

    let status = match outcome.status {
        RunStatus::Done => "done",
        RunStatus::Exhausted => "exhausted",
        RunStatus::Interrupted => "interrupted",
    };
    println!(
        "Status: {} after {} rounds ({} tokens)",
        status, outcome.rounds, outcome.usage.total_tokens
    );

    if outcome.changes.is_empty() {
        println!("No files changed.");
    } else {
        println!("Files changed:");
        for change in outcome.changes.deduplicated() {
            println!("  {}", change);
        }
    }
}

pub fn print_tools(config: &Config) -> Result<()> {
    let sandbox = RepoSandbox::new(".")?;
    let registry = ToolRegistry::with_defaults(sandbox, &config.tools);
    println!("{}", serde_json::to_string_pretty(&registry.definitions())?);
    Ok(())
}

/// Run one tool call; returns `false` when the tool reported an error
pub async fn exec_tool(config: &Config, repo: &Path, tool: &str, input: &str) -> Result<bool> {
    let input: serde_json::Value =
        serde_json::from_str(input).context("Tool input must be a JSON object")?;
    let sandbox = RepoSandbox::new(repo)?;
    let registry = ToolRegistry::with_defaults(sandbox, &config.tools);

    match registry.execute(tool, input).await {
        ToolOutput::Success(text) => {
            println!("{}", text);
            Ok(true)
        }
        ToolOutput::Error(text) => {
            eprintln!("{}", text);
            Ok(false)
        }
    }
}
