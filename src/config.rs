//! Application configuration
//!
//! Model, agent, and sandbox settings loaded from a YAML document. Prompt
//! templates and providers are resolved through compile-time registries: a
//! config key selects a variant, the variant constructs the object.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::agent::prompt::PromptTemplate;
use crate::agent::AgentConfig;
use crate::llm::{ChatCompletionClient, LlmClient};
use crate::sandbox::SandboxConfig;

/// Error type for configuration loading and resolution.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yml::Error),
    UnknownModel(String),
    MissingApiKey(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Config IO error: {}", e),
            ConfigError::Yaml(e) => write!(f, "Config parse error: {}", e),
            ConfigError::UnknownModel(name) => write!(f, "Unknown model config: {}", name),
            ConfigError::MissingApiKey(var) => {
                write!(f, "API key environment variable not set: {}", var)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_yml::Error> for ConfigError {
    fn from(e: serde_yml::Error) -> Self {
        ConfigError::Yaml(e)
    }
}

/// Prompt template selector. Resolved at compile time; the config names a
/// variant, never a class path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    #[default]
    ZeroShotReact,
    SimpleReact,
}

impl PromptKind {
    pub fn template(self) -> PromptTemplate {
        match self {
            PromptKind::ZeroShotReact => PromptTemplate::zero_shot_react(),
            PromptKind::SimpleReact => PromptTemplate::simple_react(),
        }
    }
}

/// LLM provider selector, same compile-time registry shape as `PromptKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Any OpenAI-style `/v1/chat/completions` endpoint.
    #[default]
    ChatCompletions,
}

/// One named model entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Model identifier sent to the provider.
    pub model: String,
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key. Empty means no auth.
    #[serde(default)]
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default)]
    pub prompt: PromptKind,
}

fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}

impl ModelConfig {
    /// Build the LLM client for this entry.
    pub fn build_client(&self) -> Result<Arc<dyn LlmClient>, ConfigError> {
        match self.provider {
            ProviderKind::ChatCompletions => {
                let mut client = ChatCompletionClient::new(&self.base_url, &self.model)
                    .with_temperature(self.temperature);
                if !self.api_key_env.is_empty() {
                    let key = std::env::var(&self.api_key_env)
                        .map_err(|_| ConfigError::MissingApiKey(self.api_key_env.clone()))?;
                    client = client.with_api_key(key);
                }
                Ok(Arc::new(client))
            }
        }
    }
}

/// Agent loop bounds as they appear in the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub max_iterations: usize,
    pub max_single_step_iterations: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        let defaults = AgentConfig::default();
        Self {
            max_iterations: defaults.max_iterations,
            max_single_step_iterations: defaults.max_single_step_iterations,
        }
    }
}

impl From<&AgentSettings> for AgentConfig {
    fn from(settings: &AgentSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            max_single_step_iterations: settings.max_single_step_iterations,
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Named model entries; `default_model` selects one.
    pub models: HashMap<String, ModelConfig>,
    pub default_model: String,
    pub agent: AgentSettings,
    pub sandbox: SandboxConfig,
}

impl AppConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Resolve a model entry by name; an empty name means the default model.
    pub fn model(&self, name: &str) -> Result<&ModelConfig, ConfigError> {
        let name = if name.is_empty() {
            &self.default_model
        } else {
            name
        };
        self.models
            .get(name)
            .ok_or_else(|| ConfigError::UnknownModel(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
default_model: local
models:
  local:
    model: qwen3
    base_url: http://127.0.0.1:11434
    temperature: 0.2
    prompt: zero_shot_react
  hosted:
    model: gpt-4o-mini
    api_key_env: OPENAI_API_KEY
    prompt: simple_react
agent:
  max_iterations: 5
sandbox:
  python_bin: python3.11
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.default_model, "local");
        assert_eq!(config.models.len(), 2);
        assert_eq!(config.agent.max_iterations, 5);
        // Unspecified fields keep their defaults
        assert_eq!(config.agent.max_single_step_iterations, 3);
        assert_eq!(config.sandbox.python_bin, "python3.11");
        assert_eq!(config.sandbox.execute_timeout_secs, 30);
    }

    #[test]
    fn test_model_resolution() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.model("").unwrap().model, "qwen3");
        assert_eq!(config.model("hosted").unwrap().model, "gpt-4o-mini");
        assert!(matches!(
            config.model("nope"),
            Err(ConfigError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_prompt_kind_selects_template() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.model("local").unwrap().prompt, PromptKind::ZeroShotReact);
        assert_eq!(config.model("hosted").unwrap().prompt, PromptKind::SimpleReact);
        let template = PromptKind::SimpleReact.template();
        assert_eq!(template.name(), "SimpleReactPrompt");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_yaml("{}").unwrap();
        assert_eq!(config.agent.max_iterations, 10);
        assert!(config.models.is_empty());
    }

    #[test]
    fn test_build_client_without_key() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();
        let client = config.model("local").unwrap().build_client().unwrap();
        assert_eq!(client.model_name(), "qwen3");
    }
}
