//! Configuration management for repo-agent

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Which endpoint adapter to use: "bedrock" or "claude"
    pub provider: String,
    /// Upper bound for a single model round-trip
    pub request_timeout_secs: u64,
    pub claude: ClaudeConfig,
    pub bedrock: BedrockConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "bedrock".to_string(),
            request_timeout_secs: 120,
            claude: ClaudeConfig::default(),
            bedrock: BedrockConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaudeConfig {
    pub model: String,
    pub max_tokens: usize,
    pub api_url: String,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 8192,
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BedrockConfig {
    pub model: String,
    pub region: String,
    pub max_tokens: usize,
    /// Overrides the regional `bedrock-runtime` endpoint (proxies, tests)
    pub endpoint: Option<String>,
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            model: "us.anthropic.claude-sonnet-4-20250514-v1:0".to_string(),
            region: "us-east-1".to_string(),
            max_tokens: 8192,
            endpoint: None,
        }
    }
}

impl BedrockConfig {
    pub fn endpoint_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", self.region))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Safety cap on model round-trips per invocation
    pub max_rounds: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { max_rounds: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub shell_enabled: bool,
    pub command_timeout_secs: u64,
    pub max_command_output_chars: usize,
    pub max_search_matches: usize,
    pub max_tree_entries: usize,
    pub default_tree_depth: usize,
    /// Literal command prefixes refused in addition to the built-in deny-list
    pub denied_command_prefixes: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            shell_enabled: true,
            command_timeout_secs: 60,
            max_command_output_chars: 10_000,
            max_search_matches: 100,
            max_tree_entries: 500,
            default_tree_depth: 4,
            denied_command_prefixes: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from default location or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "repo-agent") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Ok(PathBuf::from("config.toml"))
        }
    }

    /// Environment variables win over file values for deployment-specific settings
    pub fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var("BEDROCK_MODEL_ID") {
            if !model.is_empty() {
                self.llm.bedrock.model = model;
            }
        }
        if let Ok(region) = std::env::var("AWS_DEFAULT_REGION") {
            if !region.is_empty() {
                self.llm.bedrock.region = region;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_safety_limits() {
        let config = Config::default();
        assert_eq!(config.agent.max_rounds, 30);
        assert_eq!(config.tools.command_timeout_secs, 60);
        assert_eq!(config.tools.max_command_output_chars, 10_000);
        assert_eq!(config.tools.max_search_matches, 100);
        assert_eq!(config.tools.max_tree_entries, 500);
        assert_eq!(config.tools.default_tree_depth, 4);
        assert_eq!(config.llm.provider, "bedrock");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [agent]
            max_rounds = 5

            [tools]
            denied_command_prefixes = ["npm publish"]
            "#,
        )
        .unwrap();

        assert_eq!(config.agent.max_rounds, 5);
        assert_eq!(config.tools.denied_command_prefixes, vec!["npm publish"]);
        assert!(config.tools.shell_enabled);
        assert_eq!(config.llm.request_timeout_secs, 120);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[llm]\nprovider = \"claude\"\n[llm.claude]\nmodel = \"claude-test\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.llm.provider, "claude");
        assert_eq!(config.llm.claude.model, "claude-test");
    }

    #[test]
    fn test_bedrock_endpoint_from_region() {
        let mut bedrock = BedrockConfig {
            region: "eu-west-1".to_string(),
            ..Default::default()
        };
        assert_eq!(
            bedrock.endpoint_url(),
            "https://bedrock-runtime.eu-west-1.amazonaws.com"
        );

        bedrock.endpoint = Some("http://127.0.0.1:9000".to_string());
        assert_eq!(bedrock.endpoint_url(), "http://127.0.0.1:9000");
    }
}
