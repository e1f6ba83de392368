//! Configuration module for filehost.

use serde::Deserialize;
use std::path::Path;

use crate::{FilehostError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/filehost.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// File storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    /// Directory uploaded files are written to.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
    /// Maximum request payload in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
    /// Allowed file extensions (without the dot). `None` allows everything.
    #[serde(default)]
    pub allowed_extensions: Option<Vec<String>>,
    /// Remove orphaned files and report missing ones at startup.
    #[serde(default = "default_reconcile_on_startup")]
    pub reconcile_on_startup: bool,
}

fn default_upload_dir() -> String {
    "data/uploads".to_string()
}

fn default_max_upload_size() -> u64 {
    5 * 1024 // 5GB
}

fn default_reconcile_on_startup() -> bool {
    true
}

impl FilesConfig {
    /// Maximum request payload in bytes.
    pub fn max_upload_size_bytes(&self) -> u64 {
        self.max_upload_size_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            max_upload_size_mb: default_max_upload_size(),
            allowed_extensions: None,
            reconcile_on_startup: default_reconcile_on_startup(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/filehost.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// File storage configuration.
    #[serde(default)]
    pub files: FilesConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FilehostError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FilehostError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FILEHOST_DATABASE_PATH`: database file location
    /// - `FILEHOST_UPLOAD_DIR`: upload directory
    /// - `FILEHOST_MAX_UPLOAD_SIZE_MB`: maximum payload size
    ///
    /// Empty or unparsable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(path) = non_empty_env("FILEHOST_DATABASE_PATH") {
            self.database.path = path;
        }
        if let Some(dir) = non_empty_env("FILEHOST_UPLOAD_DIR") {
            self.files.upload_dir = dir;
        }
        if let Some(size) = non_empty_env("FILEHOST_MAX_UPLOAD_SIZE_MB") {
            match size.parse::<u64>() {
                Ok(size) => self.files.max_upload_size_mb = size,
                Err(_) => tracing::warn!(
                    value = %size,
                    "Ignoring invalid FILEHOST_MAX_UPLOAD_SIZE_MB"
                ),
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - The maximum upload size is zero
    /// - The extension allow-list contains an empty entry
    pub fn validate(&self) -> Result<()> {
        if self.files.max_upload_size_mb == 0 {
            return Err(FilehostError::Config(
                "files.max_upload_size_mb must be greater than zero".to_string(),
            ));
        }
        if let Some(ref exts) = self.files.allowed_extensions {
            if exts.iter().any(|e| e.trim().trim_start_matches('.').is_empty()) {
                return Err(FilehostError::Config(
                    "files.allowed_extensions must not contain empty entries".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
