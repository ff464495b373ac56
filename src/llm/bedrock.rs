//! Amazon Bedrock Converse API provider (bearer token authentication)
//!
//! Requests go to `POST {endpoint}/model/{model_id}/converse`. The bearer token
//! comes from `AWS_BEARER_TOKEN_BEDROCK`; SigV4 signing is not supported.

use super::{
    ContentBlock, LlmError, LlmProvider, Message, ModelReply, Role, StopReason, TokenUsage,
    ToolDefinition,
};
use crate::config::BedrockConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;
use std::time::Duration;

pub struct BedrockProvider {
    client: reqwest::Client,
    bearer_token: String,
    endpoint: String,
    model: String,
    max_tokens: usize,
}

impl BedrockProvider {
    pub fn new(
        bearer_token: impl Into<String>,
        config: &BedrockConfig,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(LlmError::from_network_error)?;

        Ok(Self {
            client,
            bearer_token: bearer_token.into(),
            endpoint: config.endpoint_url().trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    /// Build from `AWS_BEARER_TOKEN_BEDROCK`
    pub fn from_env(config: &BedrockConfig, timeout: Duration) -> Result<Self, LlmError> {
        let token = env::var("AWS_BEARER_TOKEN_BEDROCK")
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                LlmError::Unauthorized(
                    "AWS_BEARER_TOKEN_BEDROCK environment variable not set".to_string(),
                )
            })?;
        Self::new(token, config, timeout)
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    fn converse_url(&self) -> String {
        format!("{}/model/{}/converse", self.endpoint, self.model)
    }

    fn convert_block(block: &ContentBlock) -> Value {
        match block {
            ContentBlock::Text { text } => json!({ "text": text }),
            ContentBlock::ToolUse { id, name, input } => json!({
                "toolUse": { "toolUseId": id, "name": name, "input": input }
            }),
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                let mut result = json!({
                    "toolUseId": tool_use_id,
                    "content": [{ "text": content }],
                });
                if *is_error {
                    result["status"] = json!("error");
                }
                json!({ "toolResult": result })
            }
        }
    }

    fn convert_messages(messages: &[Message]) -> Vec<ConverseMessage> {
        messages
            .iter()
            .map(|msg| ConverseMessage {
                role: match msg.role {
                    Role::User => "user".to_string(),
                    Role::Assistant => "assistant".to_string(),
                },
                content: msg.content.iter().map(Self::convert_block).collect(),
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Value {
        let specs: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "toolSpec": {
                        "name": t.name,
                        "description": t.description,
                        "inputSchema": { "json": t.parameters },
                    }
                })
            })
            .collect();
        json!({ "tools": specs })
    }

    /// Parse one Converse content block; blocks this client does not act on are skipped
    fn parse_block(block: &Value) -> Result<Option<ContentBlock>, LlmError> {
        if let Some(text) = block.get("text").and_then(Value::as_str) {
            return Ok(Some(ContentBlock::text(text)));
        }

        if let Some(tool_use) = block.get("toolUse") {
            let id = tool_use
                .get("toolUseId")
                .and_then(Value::as_str)
                .ok_or_else(|| LlmError::InvalidResponse("toolUse without toolUseId".into()))?;
            let name = tool_use
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| LlmError::InvalidResponse("toolUse without name".into()))?;
            let input = tool_use.get("input").cloned().unwrap_or_else(|| json!({}));
            return Ok(Some(ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input,
            }));
        }

        tracing::debug!("Skipping unsupported Converse content block: {}", block);
        Ok(None)
    }

    fn parse_response(response: ConverseResponse) -> Result<ModelReply, LlmError> {
        let content = response
            .output
            .message
            .content
            .iter()
            .map(Self::parse_block)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect();

        let usage = response.usage.map(|u| TokenUsage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
            total_tokens: u.total_tokens.unwrap_or(u.input_tokens + u.output_tokens),
        });

        Ok(ModelReply {
            message: Message {
                role: Role::Assistant,
                content,
            },
            stop_reason: StopReason::from_wire(&response.stop_reason),
            usage,
        })
    }
}

#[async_trait]
impl LlmProvider for BedrockProvider {
    fn name(&self) -> &str {
        "bedrock"
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
        let request = ConverseRequest {
            messages: Self::convert_messages(messages),
            system: (!system.is_empty()).then(|| vec![json!({ "text": system })]),
            tool_config: (!tools.is_empty()).then(|| Self::convert_tools(tools)),
            inference_config: InferenceConfig {
                max_tokens: self.max_tokens,
            },
        };

        let url = self.converse_url();
        tracing::debug!("Calling Bedrock API: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .json(&request)
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
        let parsed: ConverseResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Self::parse_response(parsed)
    }
}

// Converse API request/response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConverseRequest {
    messages: Vec<ConverseMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<Value>,
    inference_config: InferenceConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConverseMessage {
    role: String,
    content: Vec<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InferenceConfig {
    max_tokens: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseResponse {
    output: ConverseOutput,
    stop_reason: String,
    usage: Option<ConverseUsage>,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    message: ConverseMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
    total_tokens: Option<u32>,
}
