//! Repository-editing agent: conversation loop, prompts and change tracking

mod changes;
mod conversation;
mod orchestrator;
pub mod prompt;

pub use changes::{ChangeKind, ChangeLog, ChangeRecord};
pub use conversation::Conversation;
pub use orchestrator::{
    AgentOutcome, ChangeAgent, RunStatus, TaskInput, DEFAULT_MAX_ROUNDS, EXHAUSTED_SUMMARY,
    INTERRUPTED_SUMMARY, NO_SUMMARY,
};
pub use prompt::{ReviewComment, Ticket};
