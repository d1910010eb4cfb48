//! Configuration loading, validation, and management for voxturn.
//!
//! Loads configuration from `~/.voxturn/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.voxturn/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the completion provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model used for both the primary and follow-up streams
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Turn behavior
    #[serde(default)]
    pub turn: TurnConfig,

    /// Live-agent handoff behavior
    #[serde(default)]
    pub handoff: HandoffConfig,

    /// Argument augmentation rules
    #[serde(default)]
    pub augment: AugmentConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_true() -> bool {
    true
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
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("turn", &self.turn)
            .field("handoff", &self.handoff)
            .field("augment", &self.augment)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Spoken when the provider fails mid-turn
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,

    /// Hold back the newest fragment until another arrives (last-token compensation)
    #[serde(default = "default_true")]
    pub buffer_trailing_fragment: bool,

    /// Speak a short acknowledgement before running a tool
    #[serde(default)]
    pub announce_tools: bool,

    /// Abort a pending handoff timer when the next turn starts
    #[serde(default = "default_true")]
    pub cancel_handoff_on_new_turn: bool,

    /// Initial system prompt (already rendered)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_fallback_message() -> String {
    "I apologize, that request might have been a bit too complex. Could you try asking one thing at a time? I'd be happy to help step by step!".into()
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            fallback_message: default_fallback_message(),
            buffer_trailing_fragment: true,
            announce_tools: false,
            cancel_handoff_on_new_turn: true,
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffConfig {
    /// Function whose invocation ends the session
    #[serde(default = "default_handoff_function")]
    pub function_name: String,

    #[serde(default = "default_reason_code")]
    pub reason_code: String,

    /// Delay between the handoff tool running and `endSession`
    #[serde(default = "default_handoff_delay_ms")]
    pub delay_ms: u64,

    /// Instruction appended to the context for the summary request
    #[serde(default = "default_summary_prompt")]
    pub summary_prompt: String,
}

fn default_handoff_function() -> String {
    "liveAgentHandoff".into()
}
fn default_reason_code() -> String {
    "live-agent-handoff".into()
}
fn default_handoff_delay_ms() -> u64 {
    3000
}
fn default_summary_prompt() -> String {
    "Summarize the conversation so far in 2-3 sentences.".into()
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            function_name: default_handoff_function(),
            reason_code: default_reason_code(),
            delay_ms: default_handoff_delay_ms(),
            summary_prompt: default_summary_prompt(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugmentConfig {
    /// Functions that receive the session phone numbers as `to` / `from`
    #[serde(default = "default_phone_number_functions")]
    pub phone_number_functions: Vec<String>,
}

fn default_phone_number_functions() -> Vec<String> {
    vec!["sendAppointmentConfirmationSms".into()]
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            phone_number_functions: default_phone_number_functions(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.voxturn/config.toml).
    ///
    /// Also checks environment variables:
    /// - `VOXTURN_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `VOXTURN_API_URL`
    /// - `VOXTURN_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("VOXTURN_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(url) = std::env::var("VOXTURN_API_URL") {
            config.api_url = url;
        }

        if let Ok(model) = std::env::var("VOXTURN_MODEL") {
            config.model = model;
        }

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

        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".voxturn")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.turn.fallback_message.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "turn.fallback_message must not be empty".into(),
            ));
        }

        if self.handoff.function_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "handoff.function_name must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
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
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            turn: TurnConfig::default(),
            handoff: HandoffConfig::default(),
            augment: AugmentConfig::default(),
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
