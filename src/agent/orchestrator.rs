//! Bounded conversation loop that turns tool-use requests into tool calls

use super::changes::{ChangeLog, ChangeRecord};
use super::conversation::Conversation;
use super::prompt::{ticket_prompt, Ticket, SYSTEM_PROMPT};
use crate::llm::{ContentBlock, LlmError, LlmProvider, StopReason, TokenUsage, ToolCall};
use crate::tools::{ToolKind, ToolRegistry};
use serde::Serialize;
use std::sync::Arc;

/// Default safety cap on model round-trips
pub const DEFAULT_MAX_ROUNDS: usize = 30;

pub const NO_SUMMARY: &str = "(no summary provided)";

pub const EXHAUSTED_SUMMARY: &str =
    "Agent reached the maximum number of iterations. Some changes may be incomplete.";

pub const INTERRUPTED_SUMMARY: &str =
    "Agent was interrupted before finishing. Some changes may be incomplete.";

/// Tool inputs are logged up to this many characters
const LOGGED_INPUT_CHARS: usize = 120;

/// What the first user message is built from
#[derive(Debug, Clone)]
pub enum TaskInput {
    Ticket(Ticket),
    Prompt(String),
}

impl TaskInput {
    fn first_prompt(&self) -> String {
        match self {
            TaskInput::Ticket(ticket) => ticket_prompt(ticket),
            TaskInput::Prompt(prompt) => prompt.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Done,
    Exhausted,
    Interrupted,
}

/// Result of one agent run, handed to whatever commits or reports the changes
#[derive(Debug, Clone, Serialize)]
pub struct AgentOutcome {
    pub summary: String,
    pub changes: ChangeLog,
    pub status: RunStatus,
    /// Model round-trips made
    pub rounds: usize,
    pub usage: TokenUsage,
}

impl AgentOutcome {
    pub fn into_parts(self) -> (String, ChangeLog) {
        (self.summary, self.changes)
    }
}

enum AgentState {
    Running(usize),
    AwaitingToolResults { round: usize, calls: Vec<ToolCall> },
    Done(String),
    Exhausted,
}

/// Drives one repository-editing conversation against a model endpoint
pub struct ChangeAgent {
    llm: Arc<dyn LlmProvider>,
    tools: ToolRegistry,
    max_rounds: usize,
    system_prompt: String,
}

impl ChangeAgent {
    pub fn new(llm: Arc<dyn LlmProvider>, tools: ToolRegistry) -> Self {
        Self {
            llm,
            tools,
            max_rounds: DEFAULT_MAX_ROUNDS,
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub async fn run(&self, task: TaskInput) -> Result<AgentOutcome, LlmError> {
        self.run_with_interrupt(task, || false).await
    }

    /// Run the loop, checking `interrupted` before every model round-trip
    pub async fn run_with_interrupt<F>(
        &self,
        task: TaskInput,
        interrupted: F,
    ) -> Result<AgentOutcome, LlmError>
    where
        F: Fn() -> bool,
    {
        let definitions = self.tools.definitions();
        let mut conversation = Conversation::new(task.first_prompt());
        let mut changes = ChangeLog::new();
        let mut usage = TokenUsage::default();
        let mut rounds = 0;
        let mut state = AgentState::Running(1);

        tracing::info!(
            "Starting agent with {} via {} ({} tools, max {} rounds)",
            self.llm.model(),
            self.llm.name(),
            definitions.len(),
            self.max_rounds
        );

        loop {
            state = match state {
                AgentState::Running(round) if round > self.max_rounds => AgentState::Exhausted,

                AgentState::Running(round) => {
                    if interrupted() {
                        tracing::info!("Agent interrupted before round {}", round);
                        return Ok(AgentOutcome {
                            summary: INTERRUPTED_SUMMARY.to_string(),
                            changes,
                            status: RunStatus::Interrupted,
                            rounds,
                            usage,
                        });
                    }

                    tracing::info!("Agent round {} / {}", round, self.max_rounds);
                    let reply = match self
                        .llm
                        .converse(&self.system_prompt, conversation.messages(), &definitions)
                        .await
                    {
                        Ok(reply) => reply,
                        Err(e) => {
                            tracing::debug!("Model call failed in round {}: {}", round, e);
                            return Err(e);
                        }
                    };
                    rounds = round;

                    if let Some(round_usage) = reply.usage {
                        usage.add(&round_usage);
                    }

                    let calls = reply.message.tool_calls();
                    let summary = reply
                        .message
                        .joined_text()
                        .unwrap_or_else(|| NO_SUMMARY.to_string());
                    conversation.push_assistant(reply.message);

                    match reply.stop_reason {
                        StopReason::EndTurn => AgentState::Done(summary),
                        StopReason::ToolUse if calls.is_empty() => {
                            tracing::warn!("Tool use requested without any tool calls");
                            AgentState::Done(summary)
                        }
                        StopReason::ToolUse => AgentState::AwaitingToolResults { round, calls },
                        StopReason::Other(reason) => {
                            tracing::warn!("Unexpected stop reason: {}", reason);
                            AgentState::Done(summary)
                        }
                    }
                }

                AgentState::AwaitingToolResults { round, calls } => {
                    let results = self.execute_calls(calls, &mut changes).await;
                    conversation.push_tool_results(results);
                    AgentState::Running(round + 1)
                }

                AgentState::Done(summary) => {
                    tracing::info!(
                        "Agent finished after {} rounds with {} changes",
                        rounds,
                        changes.len()
                    );
                    return Ok(AgentOutcome {
                        summary,
                        changes,
                        status: RunStatus::Done,
                        rounds,
                        usage,
                    });
                }

                AgentState::Exhausted => {
                    tracing::warn!("Agent reached max rounds ({})", self.max_rounds);
                    return Ok(AgentOutcome {
                        summary: EXHAUSTED_SUMMARY.to_string(),
                        changes,
                        status: RunStatus::Exhausted,
                        rounds,
                        usage,
                    });
                }
            };
        }
    }

    /// Run each call in order and build one result block per call
    async fn execute_calls(
        &self,
        calls: Vec<ToolCall>,
        changes: &mut ChangeLog,
    ) -> Vec<ContentBlock> {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            let logged: String = call
                .arguments
                .to_string()
                .chars()
                .take(LOGGED_INPUT_CHARS)
                .collect();
            tracing::info!("  Tool: {}({})", call.name, logged);

            let output = self.tools.execute(&call.name, call.arguments.clone()).await;

            if !output.is_error() {
                if let Some(record) = call
                    .name
                    .parse::<ToolKind>()
                    .ok()
                    .filter(|kind| kind.is_mutating())
                    .and_then(|kind| ChangeRecord::from_tool_call(kind, &call.arguments))
                {
                    changes.push(record);
                }
            }

            let is_error = output.is_error();
            results.push(ContentBlock::tool_result(
                call.id,
                output.into_text(),
                is_error,
            ));
        }

        results
    }
}
