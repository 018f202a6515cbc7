//! Configuration loading, validation, and management for chatclaw.
//!
//! Loads configuration from `chatclaw.toml` in the working directory (or an
//! explicit path) with environment variable overrides. Validates all
//! settings at startup — the engine credential is required before the
//! daemon will run.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `chatclaw.toml`.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Conversational engine settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Security boundary settings.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Session persistence settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Transport settings.
    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// API key for the engine. Usually supplied via `GEMINI_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Conversational model.
    #[serde(default = "default_model")]
    pub model: String,

    /// Image generation model.
    #[serde(default = "default_image_model")]
    pub image_model: String,

    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_image_model() -> String {
    "gemini-2.5-flash-image".into()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            image_model: default_image_model(),
            base_url: default_base_url(),
        }
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("image_model", &self.image_model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Root directory outside which no file or shell operation may occur.
    /// Defaults to the parent of the working directory.
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,
}

fn default_project_root() -> PathBuf {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| cwd.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory for generated artifacts and the durable session record.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,

    /// Path of the durable session record. Defaults to
    /// `<artifacts_dir>/sessions.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions_file: Option<PathBuf>,

    /// Retention cap: histories longer than this keep the two preamble
    /// turns plus the newest remainder.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}
fn default_max_turns() -> usize {
    200
}

impl SessionConfig {
    /// Resolved path of the durable session record.
    pub fn sessions_path(&self) -> PathBuf {
        self.sessions_file
            .clone()
            .unwrap_or_else(|| self.artifacts_dir.join("sessions.json"))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: default_artifacts_dir(),
            sessions_file: None,
            max_turns: default_max_turns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Optional command prefix stripped from inbound text (e.g., "!ai").
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Whether messages from the connected account itself are processed.
    #[serde(default = "default_true")]
    pub allow_self: bool,
}

fn default_command_prefix() -> String {
    "!ai".into()
}
fn default_true() -> bool {
    true
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            allow_self: default_true(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (`./chatclaw.toml`).
    ///
    /// Also checks environment variables:
    /// - `GEMINI_API_KEY` — engine credential (highest priority)
    /// - `CHATCLAW_MODEL` — conversational model override
    /// - `CHATCLAW_PROJECT_ROOT` — security root override
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("chatclaw.toml"))
    }

    /// Load configuration from a specific file path, then apply environment
    /// overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            tracing::info!("No config file found at {}, using defaults", path.display());
            Self::default()
        };

        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            config.engine.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("CHATCLAW_MODEL") {
            config.engine.model = model;
        }
        if let Ok(root) = std::env::var("CHATCLAW_PROJECT_ROOT") {
            config.security.project_root = PathBuf::from(root);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match &self.engine.api_key {
            Some(key) if !key.trim().is_empty() => {}
            _ => {
                return Err(ConfigError::ValidationError(
                    "engine.api_key is required (set GEMINI_API_KEY)".into(),
                ));
            }
        }

        if self.session.max_turns < 4 {
            return Err(ConfigError::ValidationError(
                "session.max_turns must be at least 4".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("engine", &self.engine)
            .field("security", &self.security)
            .field("session", &self.session)
            .field("transport", &self.transport)
            .finish()
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
