//! Configuration loading, validation, and management for CountBot.
//!
//! Loads configuration from `~/.countbot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.countbot/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model and agent-loop settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Workspace location
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Command guard, confinement and audit settings
    #[serde(default)]
    pub security: SecurityConfig,

    /// Builtin tool settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Names used in the system prompt
    #[serde(default)]
    pub persona: PersonaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Ceiling for both loop iterations and tool calls per user turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Attempts per tool call before it counts as a permanent failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between attempts
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_max_iterations() -> u32 {
    25
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_iterations: default_max_iterations(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Workspace root. Defaults to `~/.countbot/workspace`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Confine file and command tools to the workspace
    #[serde(default = "default_true")]
    pub restrict_to_workspace: bool,

    /// Apply the deny patterns to shell commands
    #[serde(default = "default_true")]
    pub dangerous_commands_blocked: bool,

    /// Extra deny patterns, appended to the builtin ones
    #[serde(default)]
    pub custom_deny_patterns: Vec<String>,

    /// Only run commands matching `custom_allow_patterns`
    #[serde(default)]
    pub command_whitelist_enabled: bool,

    #[serde(default)]
    pub custom_allow_patterns: Vec<String>,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    #[serde(default = "default_max_output_length")]
    pub max_output_length: usize,

    #[serde(default = "default_true")]
    pub audit_log_enabled: bool,

    /// Directory for JSONL audit files. Defaults to `~/.countbot/audit_logs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_log_dir: Option<PathBuf>,

    #[serde(default = "default_audit_retention_days")]
    pub audit_retention_days: u32,
}

fn default_true() -> bool {
    true
}
fn default_command_timeout() -> u64 {
    30
}
fn default_max_output_length() -> usize {
    10_000
}
fn default_audit_retention_days() -> u32 {
    30
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            restrict_to_workspace: true,
            dangerous_commands_blocked: true,
            custom_deny_patterns: Vec::new(),
            command_whitelist_enabled: false,
            custom_allow_patterns: Vec::new(),
            command_timeout_secs: default_command_timeout(),
            max_output_length: default_max_output_length(),
            audit_log_enabled: true,
            audit_log_dir: None,
            audit_retention_days: default_audit_retention_days(),
        }
    }
}

impl SecurityConfig {
    /// Allow patterns in effect, or `None` when the whitelist is off.
    pub fn allow_patterns(&self) -> Option<&[String]> {
        self.command_whitelist_enabled
            .then_some(self.custom_allow_patterns.as_slice())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Default `maxChars` for `web_fetch`
    #[serde(default = "default_web_fetch_max_chars")]
    pub web_fetch_max_chars: usize,

    /// Brave Search subscription token; `web_search` reports an error without one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_search_api_key: Option<String>,

    /// Default result count for `web_search` (1-10)
    #[serde(default = "default_web_search_max_results")]
    pub web_search_max_results: usize,

    /// Default result limit for `file_search` (1-100)
    #[serde(default = "default_file_search_max_results")]
    pub file_search_max_results: usize,
}

fn default_web_fetch_max_chars() -> usize {
    50_000
}
fn default_web_search_max_results() -> usize {
    5
}
fn default_file_search_max_results() -> usize {
    20
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            web_fetch_max_chars: default_web_fetch_max_chars(),
            web_search_api_key: None,
            web_search_max_results: default_web_search_max_results(),
            file_search_max_results: default_file_search_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default = "default_ai_name")]
    pub ai_name: String,

    #[serde(default = "default_user_name")]
    pub user_name: String,
}

fn default_ai_name() -> String {
    "CountBot".into()
}
fn default_user_name() -> String {
    "User".into()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            ai_name: default_ai_name(),
            user_name: default_user_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.countbot/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `COUNTBOT_MODEL`
    /// - `COUNTBOT_WORKSPACE`
    /// - `COUNTBOT_RESTRICT_TO_WORKSPACE` (`true`/`false`)
    /// - `BRAVE_API_KEY` (only when `tools.web_search_api_key` is unset)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(model) = std::env::var("COUNTBOT_MODEL") {
            config.model.model = model;
        }

        if let Ok(workspace) = std::env::var("COUNTBOT_WORKSPACE") {
            config.workspace.path = Some(PathBuf::from(workspace));
        }

        if let Ok(restrict) = std::env::var("COUNTBOT_RESTRICT_TO_WORKSPACE") {
            config.security.restrict_to_workspace = parse_bool(&restrict).ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "COUNTBOT_RESTRICT_TO_WORKSPACE must be true or false, got '{restrict}'"
                ))
            })?;
        }

        if config.tools.web_search_api_key.is_none()
            && let Ok(key) = std::env::var("BRAVE_API_KEY")
        {
            config.tools.web_search_api_key = Some(key);
        }

        config.validate()?;
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

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".countbot")
    }

    /// The configured workspace, or `~/.countbot/workspace`.
    pub fn workspace_dir(&self) -> PathBuf {
        self.workspace
            .path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("workspace"))
    }

    /// The configured audit directory, or `~/.countbot/audit_logs`.
    pub fn audit_log_dir(&self) -> PathBuf {
        self.security
            .audit_log_dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("audit_logs"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.model.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "model.max_iterations must be at least 1".into(),
            ));
        }

        if self.security.command_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "security.command_timeout_secs must be at least 1".into(),
            ));
        }

        if !(1..=10).contains(&self.tools.web_search_max_results) {
            return Err(ConfigError::ValidationError(
                "tools.web_search_max_results must be between 1 and 10".into(),
            ));
        }

        if !(1..=100).contains(&self.tools.file_search_max_results) {
            return Err(ConfigError::ValidationError(
                "tools.file_search_max_results must be between 1 and 100".into(),
            ));
        }

        if self.security.max_output_length == 0 {
            return Err(ConfigError::ValidationError(
                "security.max_output_length must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
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
