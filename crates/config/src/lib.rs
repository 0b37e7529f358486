//! Configuration loading and validation for coscientist.
//!
//! Loads `coscientist.toml` with environment variable overrides. All settings
//! are validated at startup so a bad deployment fails before the first run,
//! not in the middle of one.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The root configuration structure.
///
/// Maps directly to `coscientist.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model backend (gateway to the model-serving cluster)
    #[serde(default)]
    pub llm: LlmConfig,

    /// OCR sibling service
    #[serde(default)]
    pub ocr: ServiceConfig,

    /// Knowledge-graph memory sibling service
    #[serde(default)]
    pub memory: ServiceConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Bearer API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier passed through to the backend
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the sibling service
    #[serde(default)]
    pub base_url: String,

    /// Optional bearer key
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_service_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model-turn iterations per run
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,

    /// Maximum output tokens per turn
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Timeout for one tool dispatch, in seconds
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Cap on concurrent tool dispatches within one turn
    #[serde(default = "default_tool_concurrency")]
    pub tool_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_llm_base_url() -> String {
    "http://localhost:8001/v1".into()
}
fn default_model() -> String {
    "qwen2.5-72b-instruct".into()
}
fn default_llm_timeout_secs() -> u64 {
    120
}
fn default_service_timeout_secs() -> u64 {
    120
}
fn default_max_steps() -> u32 {
    8
}
fn default_max_tokens() -> u32 {
    512
}
fn default_tool_timeout_secs() -> u64 {
    120
}
fn default_tool_concurrency() -> usize {
    4
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8080
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            model: default_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            timeout_secs: default_service_timeout_secs(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            tool_timeout_secs: default_tool_timeout_secs(),
            tool_concurrency: default_tool_concurrency(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            ocr: ServiceConfig::default(),
            memory: ServiceConfig::default(),
            agent: AgentConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("llm.base_url", &self.llm.base_url)
            .field("llm.api_key", &redact(&self.llm.api_key))
            .field("llm.model", &self.llm.model)
            .field("ocr.base_url", &self.ocr.base_url)
            .field("memory.base_url", &self.memory.base_url)
            .field("agent", &self.agent)
            .field("gateway", &self.gateway)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, then apply env overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: AppConfig = toml::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Build a config from defaults + env overrides only (no file).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = AppConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables take precedence over file values.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("COSCIENTIST_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("COSCIENTIST_LLM_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("COSCIENTIST_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("COSCIENTIST_OCR_BASE_URL") {
            self.ocr.base_url = v;
        }
        if let Ok(v) = std::env::var("COSCIENTIST_MEMORY_BASE_URL") {
            self.memory.base_url = v;
        }
        if let Ok(v) = std::env::var("COSCIENTIST_MAX_STEPS") {
            if let Ok(n) = v.parse() {
                self.agent.max_steps = n;
            } else {
                tracing::warn!(value = %v, "Ignoring non-numeric COSCIENTIST_MAX_STEPS");
            }
        }
    }

    /// Validate settings that would otherwise fail mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_steps == 0 {
            return Err(ConfigError::Invalid(
                "agent.max_steps must be a positive integer".into(),
            ));
        }
        if self.agent.tool_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "agent.tool_concurrency must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.agent.temperature) {
            return Err(ConfigError::Invalid(format!(
                "agent.temperature {} out of range [0.0, 2.0]",
                self.agent.temperature
            )));
        }
        let url = &self.llm.base_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "llm.base_url must be an http(s) URL, got {url:?}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.max_steps, 8);
        assert_eq!(config.agent.max_tokens, 512);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[llm]
base_url = "http://llm.internal:9000/v1"
model = "test-model"

[ocr]
base_url = "http://ocr.internal:8002"

[agent]
max_steps = 3
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.llm.base_url, "http://llm.internal:9000/v1");
        assert_eq!(config.llm.model, "test-model");
        assert_eq!(config.ocr.base_url, "http://ocr.internal:8002");
        assert_eq!(config.agent.max_steps, 3);
        // Unset sections fall back to defaults
        assert_eq!(config.gateway.port, 8080);
    }

    #[test]
    fn zero_max_steps_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_steps = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn bad_llm_url_rejected() {
        let mut config = AppConfig::default();
        config.llm.base_url = "not-a-url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
