//! Per-invocation conversation history

use crate::llm::{ContentBlock, Message, Role};

/// Append-only message history owned by a single agent run
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Start a conversation with its single seed user message
    pub fn new(first_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(first_prompt)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push_assistant(&mut self, message: Message) {
        debug_assert_eq!(message.role, Role::Assistant);
        self.messages.push(message);
    }

    /// Append all tool results of one round as a single user message
    pub fn push_tool_results(&mut self, results: Vec<ContentBlock>) {
        self.messages.push(Message {
            role: Role::User,
            content: results,
        });
    }
}
