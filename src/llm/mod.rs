//! LLM provider implementations

use crate::config::Config;

mod bedrock;
mod claude;
mod error;
mod types;

pub use bedrock::BedrockProvider;
pub use claude::ClaudeProvider;
pub use error::LlmError;
pub use types::*;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A chat-completion endpoint that supports structured tool invocation
///
/// One call is one round-trip: the full conversation goes out, one assistant
/// message and its stop reason come back.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Model identifier sent with each request
    fn model(&self) -> &str;

    async fn converse(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, LlmError>;
}

/// Create the provider named in config, optionally overriding name and model
pub fn create_provider(
    config: &Config,
    name: Option<&str>,
    model: Option<&str>,
) -> Result<Arc<dyn LlmProvider>> {
    let name = name.unwrap_or(&config.llm.provider);
    let timeout = Duration::from_secs(config.llm.request_timeout_secs);

    match name.to_lowercase().as_str() {
        "bedrock" | "aws" => {
            let mut p = BedrockProvider::from_env(&config.llm.bedrock, timeout)?;
            if let Some(m) = model {
                p = p.with_model(m);
            }
            tracing::info!("Using Bedrock model {}", p.model());
            Ok(Arc::new(p))
        }
        "claude" | "anthropic" => {
            let mut p = ClaudeProvider::from_env(&config.llm.claude, timeout)?;
            if let Some(m) = model {
                p = p.with_model(m);
            }
            tracing::info!("Using Claude model {}", p.model());
            Ok(Arc::new(p))
        }
        _ => anyhow::bail!(
            "Unknown provider: {}. Supported providers: bedrock, claude",
            name
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_is_rejected() {
        let config = Config::default();
        let err = match create_provider(&config, Some("gemini"), None) {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("Unknown provider: gemini"));
    }
}
