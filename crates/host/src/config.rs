//! Configuration system for firedoc
//!
//! Reads config from ~/.config/firedoc/config.toml

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use firedoc_vfs::MAX_CHUNK_LEN;
use serde::Deserialize;

pub const DEFAULT_PORT: u16 = 9417;

/// Bridge server configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: "127.0.0.1".to_string(),
        }
    }
}

/// File access configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Per-read byte cap; can only lower the built-in limit
    pub chunk_cap: u64,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            chunk_cap: MAX_CHUNK_LEN,
        }
    }
}

/// Full application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub files: FilesConfig,
}

const DEFAULT_CONFIG: &str = r#"# firedoc Configuration

[server]
port = 9417
bind = "127.0.0.1"

[files]
# Largest single read served to the viewer, in bytes (at most 5242880)
chunk_cap = 5242880
"#;

impl Config {
    /// Load configuration from default path, falling back to defaults
    pub fn load() -> Self {
        Self::load_or_default(&Self::default_config_path())
    }

    /// Load `path`, falling back to defaults when it is missing or invalid
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from_path(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring invalid config");
                Self::default()
            }
        }
    }

    /// Get default config path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("firedoc")
            .join("config.toml")
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Create default config file if it doesn't exist
    pub fn create_default_if_missing() {
        let path = Self::default_config_path();
        if path.exists() {
            return;
        }
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(&path, DEFAULT_CONFIG) {
            tracing::debug!(path = %path.display(), error = %e, "Could not write default config");
        }
    }

    /// Effective chunk cap, never above [`MAX_CHUNK_LEN`]
    pub fn chunk_cap(&self) -> u64 {
        match self.files.chunk_cap {
            0 => MAX_CHUNK_LEN,
            cap => cap.min(MAX_CHUNK_LEN),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}
