//! repo-agent: an LLM agent that edits a checked-out repository
//!
//! This library provides:
//! - A bounded conversation loop that turns model tool-use requests into tool calls
//! - Sandboxed file, search and shell tools confined to the repository root
//! - Model providers for Amazon Bedrock (Converse) and Anthropic (Messages)

pub mod agent;
pub mod config;
pub mod llm;
pub mod tools;

pub use agent::{AgentOutcome, ChangeAgent, ChangeRecord, TaskInput};
pub use config::Config;
