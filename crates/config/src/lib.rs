//! Configuration loading, validation, and management for loopevents.
//!
//! Loads configuration from `~/.loopevents/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! The core only consumes two things from here: the ordered scheduler list
//! and the broadcast timeout. Everything else configures the session around
//! them.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.loopevents/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Loop and decision settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Schedulers, in registration (and tie-break) order
    #[serde(default)]
    pub schedulers: Vec<SchedulerSettings>,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum tool executions per session
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// How long a decision broadcast waits for schedulers
    #[serde(default = "default_broadcast_timeout_ms")]
    pub broadcast_timeout_ms: u64,

    /// Preferred LLM provider; the first configured one is used if absent
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_iterations() -> u32 {
    50
}
fn default_broadcast_timeout_ms() -> u64 {
    5_000
}
fn default_provider() -> String {
    "openrouter".into()
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
fn default_true() -> bool {
    true
}

impl OrchestratorConfig {
    pub fn broadcast_timeout(&self) -> Duration {
        Duration::from_millis(self.broadcast_timeout_ms)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            broadcast_timeout_ms: default_broadcast_timeout_ms(),
            default_provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// One scheduler entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Registry key; must be unique
    pub id: String,

    /// Which scheduler implementation to instantiate
    pub module: String,

    /// Disabled entries are skipped at registry construction
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Scheduler-specific settings, passed through untouched
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

impl SchedulerSettings {
    pub fn new(id: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            module: module.into(),
            enabled: true,
            config: serde_json::Map::new(),
        }
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
            .field("api_key", &redact(&self.api_key))
            .field("orchestrator", &self.orchestrator)
            .field("schedulers", &self.schedulers)
            .field("providers", &self.providers)
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

impl AppConfig {
    /// Load configuration from the default path (~/.loopevents/config.toml).
    ///
    /// Environment overrides:
    /// - `LOOPEVENTS_API_KEY` (when no key is configured)
    /// - `LOOPEVENTS_PROVIDER`
    /// - `LOOPEVENTS_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config = Self::parse(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;

        tracing::debug!(
            path = %path.display(),
            schedulers = config.schedulers.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the `LOOPEVENTS_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides read through `lookup`, keyed by environment variable
    /// name.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("LOOPEVENTS_API_KEY");
        }

        if let Some(provider) = lookup("LOOPEVENTS_PROVIDER") {
            tracing::debug!(provider = %provider, "Provider overridden from environment");
            self.orchestrator.default_provider = provider;
        }

        if let Some(model) = lookup("LOOPEVENTS_MODEL") {
            tracing::debug!(model = %model, "Model overridden from environment");
            self.orchestrator.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".loopevents")
    }

    /// Get the default configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let o = &self.orchestrator;

        if o.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_iterations must be at least 1".into(),
            ));
        }

        if o.broadcast_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.broadcast_timeout_ms must be > 0".into(),
            ));
        }

        if !(0.0..=2.0).contains(&o.temperature) {
            return Err(ConfigError::ValidationError(
                "orchestrator.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let mut seen = HashSet::new();
        for scheduler in &self.schedulers {
            if scheduler.id.trim().is_empty() {
                return Err(ConfigError::ValidationError("scheduler id must not be empty".into()));
            }
            if scheduler.module.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "scheduler '{}' has no module",
                    scheduler.id
                )));
            }
            if !seen.insert(scheduler.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate scheduler id '{}'",
                    scheduler.id
                )));
            }
        }

        Ok(())
    }

    /// Enabled schedulers in registration order.
    pub fn enabled_schedulers(&self) -> impl Iterator<Item = &SchedulerSettings> {
        self.schedulers.iter().filter(|s| s.enabled)
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            orchestrator: OrchestratorConfig::default(),
            schedulers: vec![],
            providers: HashMap::new(),
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
