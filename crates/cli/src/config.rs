//! Configuration loading from mcp-chat.toml and the environment.

use runtime::{ChatCompletionsBackend, DEFAULT_MAX_STEPS, McpEndpoint};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "mcp-chat.toml";
pub const DOTENV_FILE: &str = ".env";

const DEFAULT_MODEL: &str = "litellm_proxy/anthropic.claude-sonnet-4-20250514-v1:0";
const ALTERNATE_MODEL: &str = "litellm_proxy/anthropic.claude-3-5-sonnet-20241022-v2:0";
const DEFAULT_MCP_URL: &str = "http://127.0.0.1:3001/mcp";
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Use MCP tools when appropriate. \
     Explain your reasoning briefly and cite which tool you used.";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub mcp: McpConfig,

    #[serde(default)]
    pub agent: AgentConfig,
}

/// Model provider configuration.
#[derive(Debug, Deserialize)]
pub struct ModelConfig {
    /// Model to use.
    #[serde(default = "default_model")]
    pub name: String,

    /// API base of an OpenAI-compatible endpoint (LiteLLM proxy by default).
    pub base_url: Option<String>,

    pub api_key: Option<String>,

    /// Omit request parameters some providers reject.
    #[serde(default = "default_true")]
    pub drop_params: bool,

    pub max_tokens: Option<u32>,

    /// Models offered by `/models`.
    #[serde(default = "default_choices")]
    pub choices: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            base_url: None,
            api_key: None,
            drop_params: true,
            max_tokens: None,
            choices: default_choices(),
        }
    }
}

/// Tool provider configuration.
#[derive(Debug, Deserialize)]
pub struct McpConfig {
    #[serde(default = "default_mcp_url")]
    pub url: String,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            url: default_mcp_url(),
        }
    }
}

/// Agent loop configuration.
#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_choices() -> Vec<String> {
    vec![DEFAULT_MODEL.to_string(), ALTERNATE_MODEL.to_string()]
}

fn default_mcp_url() -> String {
    DEFAULT_MCP_URL.to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply environment overrides.
    ///
    /// `lookup` is `std::env::var(..).ok()` in the binary. Empty values count
    /// as unset; the preferred name wins over its legacy alias.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(model) = var("LITELLM_MODEL") {
            self.model.name = model;
        }
        if let Some(base) = var("LITELLM_BASE").or_else(|| var("LITELLM_API_BASE")) {
            self.model.base_url = Some(base);
        }
        if let Some(key) = var("LITELLM_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Some(raw) = var("LITELLM_DROP_PARAMS") {
            self.model.drop_params = parse_flag(&raw).ok_or(ConfigError::InvalidValue {
                name: "LITELLM_DROP_PARAMS",
                value: raw,
            })?;
        }
        if let Some(url) = var("MCP_URL").or_else(|| var("MCP_SSE_URL")) {
            self.mcp.url = url;
        }
        if let Some(prompt) = var("SYSTEM_PROMPT") {
            self.agent.system_prompt = prompt;
        }
        Ok(())
    }

    /// The validated tool provider endpoint.
    pub fn endpoint(&self) -> Result<McpEndpoint, ConfigError> {
        McpEndpoint::parse(&self.mcp.url).map_err(|e| ConfigError::Endpoint(e.to_string()))
    }

    /// Build the model backend for `model`.
    pub fn backend(&self, model: &str) -> ChatCompletionsBackend {
        let mut builder =
            ChatCompletionsBackend::builder(model).drop_params(self.model.drop_params);
        if let Some(base) = &self.model.base_url {
            builder = builder.base_url(base);
        }
        if let Some(key) = &self.model.api_key {
            builder = builder.api_key(key);
        }
        if let Some(max_tokens) = self.model.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }
        builder.build()
    }
}

/// Read variables from a dotenv file. A missing file yields no variables.
pub fn load_dotenv(path: impl AsRef<Path>) -> Result<HashMap<String, String>, ConfigError> {
    let entries = match dotenvy::from_path_iter(path.as_ref()) {
        Ok(entries) => entries,
        Err(e) if e.not_found() => return Ok(HashMap::new()),
        Err(e) => return Err(ConfigError::Dotenv(e.to_string())),
    };
    entries
        .collect::<Result<_, _>>()
        .map_err(|e| ConfigError::Dotenv(e.to_string()))
}

/// Look a variable up in `primary`, falling back to `dotenv` when unset.
pub fn layered<'a>(
    primary: impl Fn(&str) -> Option<String> + 'a,
    dotenv: &'a HashMap<String, String>,
) -> impl Fn(&str) -> Option<String> + 'a {
    move |name: &str| primary(name).or_else(|| dotenv.get(name).cloned())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("failed to read .env: {0}")]
    Dotenv(String),

    #[error("{0}")]
    Endpoint(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_without_file() {
        let config = Config::default();
        assert_eq!(config.model.name, DEFAULT_MODEL);
        assert!(config.model.drop_params);
        assert_eq!(config.model.choices.len(), 2);
        assert_eq!(config.mcp.url, "http://127.0.0.1:3001/mcp");
        assert!(config.agent.system_prompt.starts_with("You are a helpful assistant."));
        assert_eq!(config.agent.max_steps, DEFAULT_MAX_STEPS);
    }

    #[test]
    fn parse_partial_file() {
        let config = Config::parse(
            r#"
[model]
name = "gpt-4o-mini"
base_url = "https://api.openai.com/v1"
max_tokens = 1024

[agent]
max_steps = 5
"#,
        )
        .unwrap();

        assert_eq!(config.model.name, "gpt-4o-mini");
        assert_eq!(
            config.model.base_url.as_deref(),
            Some("https://api.openai.com/v1")
        );
        assert_eq!(config.model.max_tokens, Some(1024));
        assert!(config.model.drop_params);
        assert_eq!(config.mcp.url, DEFAULT_MCP_URL);
        assert_eq!(config.agent.max_steps, 5);
        assert_eq!(config.agent.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn parse_rejects_bad_toml() {
        let err = Config::parse("[model\nname = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config::parse("[mcp]\nurl = \"http://file:9000/mcp\"").unwrap();
        config
            .apply_env(env(&[
                ("LITELLM_MODEL", "openai/gpt-4o-mini"),
                ("LITELLM_BASE", "http://proxy:4000"),
                ("LITELLM_API_KEY", "sk-123"),
                ("LITELLM_DROP_PARAMS", "false"),
                ("MCP_URL", "https://tools.example.com/mcp"),
                ("SYSTEM_PROMPT", "Be terse."),
            ]))
            .unwrap();

        assert_eq!(config.model.name, "openai/gpt-4o-mini");
        assert_eq!(config.model.base_url.as_deref(), Some("http://proxy:4000"));
        assert_eq!(config.model.api_key.as_deref(), Some("sk-123"));
        assert!(!config.model.drop_params);
        assert_eq!(config.mcp.url, "https://tools.example.com/mcp");
        assert_eq!(config.agent.system_prompt, "Be terse.");
    }

    #[test]
    fn legacy_names_apply_only_without_preferred() {
        let mut legacy = Config::default();
        legacy
            .apply_env(env(&[
                ("LITELLM_API_BASE", "http://legacy:4000"),
                ("MCP_SSE_URL", "http://legacy:3001/mcp"),
            ]))
            .unwrap();
        assert_eq!(legacy.model.base_url.as_deref(), Some("http://legacy:4000"));
        assert_eq!(legacy.mcp.url, "http://legacy:3001/mcp");

        let mut both = Config::default();
        both.apply_env(env(&[
            ("MCP_URL", "http://new:3001/mcp"),
            ("MCP_SSE_URL", "http://legacy:3001/mcp"),
        ]))
        .unwrap();
        assert_eq!(both.mcp.url, "http://new:3001/mcp");
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = Config::default();
        config
            .apply_env(env(&[("LITELLM_MODEL", ""), ("MCP_URL", "  ")]))
            .unwrap();
        assert_eq!(config.model.name, DEFAULT_MODEL);
        assert_eq!(config.mcp.url, DEFAULT_MCP_URL);
    }

    #[test]
    fn invalid_drop_params_is_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_env(env(&[("LITELLM_DROP_PARAMS", "maybe")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { name: "LITELLM_DROP_PARAMS", .. }
        ));
    }

    #[test]
    fn endpoint_is_validated() {
        let mut config = Config::default();
        assert_eq!(
            config.endpoint().unwrap().as_str(),
            "http://127.0.0.1:3001/mcp"
        );

        config.mcp.url = "ftp://bad".into();
        let err = config.endpoint().unwrap_err();
        assert!(err.to_string().contains("HTTP/HTTPS"));
    }

    #[test]
    fn backend_uses_model_settings() {
        let mut config = Config::default();
        config.model.base_url = Some("http://proxy:4000".into());
        let backend = config.backend("litellm_proxy/gpt-4o-mini");
        assert_eq!(
            backend.to_string(),
            "chat-completions(litellm_proxy/gpt-4o-mini @ http://proxy:4000/chat/completions)"
        );
    }

    #[test]
    fn dotenv_fills_unset_variables_only() {
        let path = std::env::temp_dir().join(format!("mcp-chat-{}.env", std::process::id()));
        std::fs::write(
            &path,
            "# local overrides\nLITELLM_MODEL=from-dotenv\nMCP_URL=\"http://dotenv:3001/mcp\"\n",
        )
        .unwrap();
        let dotenv = load_dotenv(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let mut config = Config::default();
        config
            .apply_env(layered(env(&[("MCP_URL", "http://process:3001/mcp")]), &dotenv))
            .unwrap();

        assert_eq!(config.model.name, "from-dotenv");
        assert_eq!(config.mcp.url, "http://process:3001/mcp");
    }

    #[test]
    fn missing_dotenv_is_empty() {
        let dotenv = load_dotenv("/nonexistent/mcp-chat/.env").unwrap();
        assert!(dotenv.is_empty());
    }
}
