//! Configuration loading, validation, and management for Nippo.
//!
//! Loads configuration from `~/.nippo/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.nippo/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model credential (can be overridden per-provider). Its absence turns
    /// collection off and formatting into the deterministic fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// GitHub MCP tool source
    #[serde(default)]
    pub github: GithubConfig,

    /// Collector generation bounds
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Caps applied by the summarizer
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Formatter behaviour
    #[serde(default)]
    pub formatter: FormatterConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "google/gemini-2.5-flash-lite".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("providers", &self.providers)
            .field("github", &self.github)
            .field("collector", &self.collector)
            .field("limits", &self.limits)
            .field("formatter", &self.formatter)
            .field("gateway", &self.gateway)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl std::fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubConfig")
            .field("token", &redact(&self.token))
            .field("mcp_url", &self.mcp_url)
            .field("namespace", &self.namespace)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Personal access token; without it the GitHub source offers no tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default = "default_mcp_url")]
    pub mcp_url: String,

    /// Prefix prepended to remote tool names (`github_search_issues`).
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_mcp_url() -> String {
    "https://api.githubcopilot.com/mcp/".into()
}
fn default_namespace() -> String {
    "github".into()
}
fn default_connect_timeout() -> u64 {
    15
}
fn default_request_timeout() -> u64 {
    60
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            mcp_url: default_mcp_url(),
            namespace: default_namespace(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Reasoning / tool-call rounds per generation (1..=8).
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Concurrent tool invocations per round (1..=2).
    #[serde(default = "default_tool_call_concurrency")]
    pub tool_call_concurrency: usize,
}

fn default_max_steps() -> u32 {
    8
}
fn default_tool_call_concurrency() -> usize {
    2
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            tool_call_concurrency: default_tool_call_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_github_items")]
    pub max_github_items: usize,

    #[serde(default = "default_max_github_items_per_type")]
    pub max_github_items_per_type: usize,

    #[serde(default = "default_max_calendar_items")]
    pub max_calendar_items: usize,
}

fn default_max_github_items() -> usize {
    60
}
fn default_max_github_items_per_type() -> usize {
    20
}
fn default_max_calendar_items() -> usize {
    20
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_github_items: default_max_github_items(),
            max_github_items_per_type: default_max_github_items_per_type(),
            max_calendar_items: default_max_calendar_items(),
        }
    }
}

/// What the formatter does when its generation call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatFailurePolicy {
    /// Fail the whole request.
    Propagate,
    /// Render the deterministic template fallback instead.
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatterConfig {
    /// Token replaced with the draft date by the deterministic fallback.
    #[serde(default = "default_date_token")]
    pub date_token: String,

    /// Whether the fallback also fills `placeholder_tokens` from draft values.
    #[serde(default)]
    pub positional_placeholders: bool,

    /// Positional tokens, filled in order with the first draft values.
    #[serde(default = "default_placeholder_tokens")]
    pub placeholder_tokens: Vec<String>,

    #[serde(default = "default_failure_policy")]
    pub on_generation_failure: FormatFailurePolicy,
}

fn default_date_token() -> String {
    "{{date}}".into()
}
fn default_placeholder_tokens() -> Vec<String> {
    vec![
        "{{dummy.todo1}}".into(),
        "{{dummy.todo2}}".into(),
        "{{dummy.next1}}".into(),
    ]
}
fn default_failure_policy() -> FormatFailurePolicy {
    FormatFailurePolicy::Propagate
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            date_token: default_date_token(),
            positional_placeholders: false,
            placeholder_tokens: default_placeholder_tokens(),
            on_generation_failure: default_failure_policy(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8787
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.nippo/config.toml).
    ///
    /// Also checks environment variables:
    /// - `NIPPO_API_KEY` (highest priority), `GOOGLE_GENERATIVE_AI_API_KEY`, `OPENAI_API_KEY`
    /// - `NIPPO_PROVIDER`, `NIPPO_MODEL`
    /// - `GITHUB_PERSONAL_ACCESS_TOKEN`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if self.api_key.is_none() {
            self.api_key = non_blank("NIPPO_API_KEY")
                .or_else(|| non_blank("GOOGLE_GENERATIVE_AI_API_KEY"))
                .or_else(|| non_blank("OPENAI_API_KEY"));
        }

        if let Some(provider) = lookup("NIPPO_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("NIPPO_MODEL") {
            self.default_model = model;
        }

        if self.github.token.is_none() {
            self.github.token = non_blank("GITHUB_PERSONAL_ACCESS_TOKEN");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".nippo")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(1..=8).contains(&self.collector.max_steps) {
            return Err(ConfigError::ValidationError(
                "collector.max_steps must be between 1 and 8".into(),
            ));
        }

        if !(1..=2).contains(&self.collector.tool_call_concurrency) {
            return Err(ConfigError::ValidationError(
                "collector.tool_call_concurrency must be 1 or 2".into(),
            ));
        }

        let limits = &self.limits;
        if limits.max_github_items == 0
            || limits.max_github_items_per_type == 0
            || limits.max_calendar_items == 0
        {
            return Err(ConfigError::ValidationError(
                "limits must all be greater than 0".into(),
            ));
        }

        if self.formatter.date_token.is_empty() {
            return Err(ConfigError::ValidationError(
                "formatter.date_token must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Check if a model credential is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            providers: HashMap::new(),
            github: GithubConfig::default(),
            collector: CollectorConfig::default(),
            limits: LimitsConfig::default(),
            formatter: FormatterConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
