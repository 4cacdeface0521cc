//! Configuration management for the NoxDrive daemon.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/noxdrive/config.toml`.
//!
//! A [`Config`] is built once at startup and handed to every service
//! constructor; nothing reads configuration from global state.

use std::collections::HashSet;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default address the HTTP server binds to.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// File name of the index snapshot inside the storage root.
pub const DEFAULT_INDEX_FILE_NAME: &str = "_index.json";

/// Top-level folders exposed when none are configured.
pub const DEFAULT_ALLOWED_ROOTS: &[&str] = &["documents", "music", "pictures", "videos"];

/// Platform metadata files that never show up in listings or archives.
pub const DEFAULT_IGNORED_NAMES: &[&str] = &[".DS_Store", "Thumbs.db", ".gitkeep"];

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("bind_addr must be a socket address like 127.0.0.1:8080, got {0}")]
    InvalidBindAddr(String),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("allowed_roots must contain at least one root")]
    NoAllowedRoots,

    #[error("allowed root must be a single plain path segment, got {0:?}")]
    InvalidRootName(String),

    #[error("allowed root listed more than once: {0}")]
    DuplicateRootName(String),

    #[error("allowed root {0:?} collides with a built-in route")]
    ReservedRootName(String),

    #[error("password_sha256 must be empty or 64 hex characters")]
    InvalidPasswordHash,
}

/// First path segments taken by the HTTP API.
const RESERVED_ROOT_NAMES: &[&str] = &["api", "health"];

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the NoxDrive daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// HTTP server and logging settings.
    pub server: ServerConfig,

    /// Storage root and the folders exposed beneath it.
    pub storage: StorageConfig,

    /// Shared credential for the access gate.
    pub auth: AuthConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: String,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Directory for rolling log files. `None` logs to stdout only.
    pub log_dir: Option<PathBuf>,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory beneath which every allowed root lives.
    pub root: PathBuf,

    /// Names of the top-level folders clients may access.
    pub allowed_roots: Vec<String>,

    /// Entry names skipped by listings, snapshots and archives.
    pub ignored_names: Vec<String>,

    /// Where the index snapshot is written. Defaults to `<root>/_index.json`.
    pub index_file: Option<PathBuf>,
}

/// Access gate credentials.
///
/// When either value is empty the gate is disabled and every request is
/// forwarded without a challenge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Expected Basic-auth user name.
    pub username: String,

    /// Lower-case hex SHA-256 digest of the expected password.
    pub password_sha256: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            allowed_roots: DEFAULT_ALLOWED_ROOTS.iter().map(|s| s.to_string()).collect(),
            ignored_names: DEFAULT_IGNORED_NAMES.iter().map(|s| s.to_string()).collect(),
            index_file: None,
        }
    }
}

impl StorageConfig {
    /// Resolved location of the index snapshot artifact.
    pub fn index_path(&self) -> PathBuf {
        self.index_file
            .clone()
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or_else(|| self.root.join(DEFAULT_INDEX_FILE_NAME))
    }
}

impl ServerConfig {
    /// Log directory, treating an empty value as unset.
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }
}

impl AuthConfig {
    /// Returns true when both secrets are configured.
    pub fn is_enabled(&self) -> bool {
        !self.username.is_empty() && !self.password_sha256.is_empty()
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("noxdrive")
        .join("config.toml")
}

/// Returns the default storage root, `public` under the working directory.
fn default_storage_root() -> PathBuf {
    PathBuf::from(".").join("public")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - NOXDRIVE_USER: Access gate user name
    /// - NOXDRIVE_PASS_SHA256: Access gate password digest
    /// - NOXDRIVE_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    /// - NOXDRIVE_STORAGE_ROOT: Override the storage root directory
    /// - NOXDRIVE_BIND_ADDR: Override the listen address
    pub fn apply_env_overrides(&mut self) {
        if let Some(user) = non_empty_env("NOXDRIVE_USER") {
            tracing::info!("Overriding auth username from environment");
            self.auth.username = user;
        }

        if let Some(hash) = non_empty_env("NOXDRIVE_PASS_SHA256") {
            tracing::info!("Overriding auth password digest from environment");
            self.auth.password_sha256 = hash.to_lowercase();
        }

        if let Some(level) = non_empty_env("NOXDRIVE_LOG_LEVEL") {
            tracing::info!("Overriding log_level from environment: {}", level);
            self.server.log_level = level;
        }

        if let Some(root) = non_empty_env("NOXDRIVE_STORAGE_ROOT") {
            tracing::info!("Overriding storage root from environment: {}", root);
            self.storage.root = PathBuf::from(root);
        }

        if let Some(addr) = non_empty_env("NOXDRIVE_BIND_ADDR") {
            tracing::info!("Overriding bind_addr from environment: {}", addr);
            self.server.bind_addr = addr;
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::InvalidBindAddr(self.server.bind_addr.clone()));
        }

        let level = self.server.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.server.log_level.clone()));
        }

        if self.storage.allowed_roots.is_empty() {
            return Err(ConfigError::NoAllowedRoots);
        }

        let mut seen = HashSet::new();
        for root in &self.storage.allowed_roots {
            if !is_plain_segment(root) {
                return Err(ConfigError::InvalidRootName(root.clone()));
            }
            if RESERVED_ROOT_NAMES.contains(&root.as_str()) {
                return Err(ConfigError::ReservedRootName(root.clone()));
            }
            if !seen.insert(root.as_str()) {
                return Err(ConfigError::DuplicateRootName(root.clone()));
            }
        }

        let hash = &self.auth.password_sha256;
        if !hash.is_empty() && (hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()))
        {
            return Err(ConfigError::InvalidPasswordHash);
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn is_plain_segment(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0', ':', '*'])
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
