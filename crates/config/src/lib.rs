//! Configuration loading, validation, and management for ContextMesh.
//!
//! Loads configuration from `~/.contextmesh/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.contextmesh/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend credential. Without one, analysis runs in placeholder mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override the backend base URL (proxies, tests)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Backend model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Lifetime of the server-side context cache, in minutes
    #[serde(default = "default_cache_ttl_minutes")]
    pub cache_ttl_minutes: u64,

    /// HTTP client timeout for backend calls, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Ingestion configuration
    #[serde(default)]
    pub ingest: IngestConfig,
}

fn default_model() -> String {
    "gemini-1.5-flash-001".into()
}
fn default_cache_ttl_minutes() -> u64 {
    600
}
fn default_request_timeout_secs() -> u64 {
    300
}

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
            .field("cache_ttl_minutes", &self.cache_ttl_minutes)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("gateway", &self.gateway)
            .field("ingest", &self.ingest)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Origins allowed by the CORS layer
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".into()]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Ignore patterns appended after the built-in defaults and `.gitignore`
    #[serde(default)]
    pub extra_patterns: Vec<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.contextmesh/config.toml).
    ///
    /// Also checks environment variables:
    /// - `GOOGLE_API_KEY`, then `GEMINI_API_KEY` (only when the file has no key)
    /// - `CONTEXTMESH_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path, |key| std::env::var(key).ok())
    }

    /// Load `path`, apply environment overrides, then validate the result.
    fn load_with_env(
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(lookup);
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

    /// Apply environment overrides through a lookup function.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("GOOGLE_API_KEY")
                .or_else(|| lookup("GEMINI_API_KEY"))
                .filter(|key| !key.trim().is_empty());
        }

        if let Some(model) = lookup("CONTEXTMESH_MODEL") {
            self.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".contextmesh")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationError("model must not be empty".into()));
        }

        if self.cache_ttl_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "cache_ttl_minutes must be > 0".into(),
            ));
        }

        if self.gateway.port == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.port must be non-zero".into(),
            ));
        }

        Ok(())
    }

    /// Check if a backend credential is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_minutes * 60)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: None,
            model: default_model(),
            cache_ttl_minutes: default_cache_ttl_minutes(),
            request_timeout_secs: default_request_timeout_secs(),
            gateway: GatewayConfig::default(),
            ingest: IngestConfig::default(),
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
