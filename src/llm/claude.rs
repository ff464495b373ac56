//! Claude (Anthropic Messages API) provider
//!
//! SECURITY: the API key is only sent to the configured Messages endpoint.

use super::{
    ContentBlock, LlmError, LlmProvider, Message, ModelReply, Role, StopReason, TokenUsage,
    ToolDefinition,
};
use crate::config::ClaudeConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct ClaudeProvider {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: usize,
}

impl ClaudeProvider {
    pub fn new(
        api_key: impl Into<String>,
        config: &ClaudeConfig,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(LlmError::from_network_error)?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    /// Build from `ANTHROPIC_API_KEY`
    pub fn from_env(config: &ClaudeConfig, timeout: Duration) -> Result<Self, LlmError> {
        let api_key = env::var("ANTHROPIC_API_KEY").map_err(|_| {
            LlmError::Unauthorized("ANTHROPIC_API_KEY environment variable not set".to_string())
        })?;
        Self::new(api_key, config, timeout)
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    fn convert_messages(messages: &[Message]) -> Vec<ClaudeMessage> {
        messages
            .iter()
            .map(|msg| ClaudeMessage {
                role: match msg.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: msg.content.iter().map(ClaudeContentBlock::from).collect(),
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Vec<ClaudeTool> {
        tools
            .iter()
            .map(|t| ClaudeTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect()
    }

    async fn send_request(&self, request: &ClaudeRequest<'_>) -> Result<ClaudeResponse, LlmError> {
        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(LlmError::from_network_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_http_status(status, error_text));
        }

        let body = response
            .text()
            .await
            .map_err(LlmError::from_network_error)?;
        serde_json::from_str(&body).map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    fn name(&self) -> &str {
        "claude"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn converse(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, LlmError> {
        let request = ClaudeRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: (!system.is_empty()).then_some(system),
            messages: Self::convert_messages(messages),
            tools: (!tools.is_empty()).then(|| Self::convert_tools(tools)),
        };

        let response = self.send_request(&request).await?;

        let content: Vec<ContentBlock> = response
            .content
            .into_iter()
            .filter_map(ClaudeContentBlock::into_content)
            .collect();

        let stop_reason = response
            .stop_reason
            .as_deref()
            .map(StopReason::from_wire)
            .unwrap_or(StopReason::EndTurn);

        let usage = response.usage.map(|u| TokenUsage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        });

        Ok(ModelReply {
            message: Message {
                role: Role::Assistant,
                content,
            },
            stop_reason,
            usage,
        })
    }
}

// Claude API request/response types

#[derive(Debug, Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ClaudeTool>>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: &'static str,
    content: Vec<ClaudeContentBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ClaudeContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    /// Blocks this client does not act on (thinking, etc.)
    #[serde(other)]
    Unknown,
}

impl ClaudeContentBlock {
    fn into_content(self) -> Option<ContentBlock> {
        match self {
            ClaudeContentBlock::Text { text } => Some(ContentBlock::Text { text }),
            ClaudeContentBlock::ToolUse { id, name, input } => {
                Some(ContentBlock::ToolUse { id, name, input })
            }
            ClaudeContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => Some(ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            }),
            ClaudeContentBlock::Unknown => None,
        }
    }
}

impl From<&ContentBlock> for ClaudeContentBlock {
    fn from(block: &ContentBlock) -> Self {
        match block {
            ContentBlock::Text { text } => ClaudeContentBlock::Text { text: text.clone() },
            ContentBlock::ToolUse { id, name, input } => ClaudeContentBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            },
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => ClaudeContentBlock::ToolResult {
                tool_use_id: tool_use_id.clone(),
                content: content.clone(),
                is_error: *is_error,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ClaudeTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContentBlock>,
    stop_reason: Option<String>,
    usage: Option<ClaudeUsage>,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}
