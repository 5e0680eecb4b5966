//! Bootstrap configuration loading
//!
//! Settings are resolved in priority order:
//! 1. Command-line arguments
//! 2. Environment variables (`HUMOR_*`, wired through clap in the binary)
//! 3. TOML configuration file
//! 4. Compiled defaults
//!
//! A missing TOML file is not an error; the service starts on defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default HTTP bind address
pub const DEFAULT_BIND: &str = "127.0.0.1:5780";

/// Default base URL of the remote caption-generation service
pub const DEFAULT_API_BASE: &str = "https://api.almostcrackd.ai";

/// Upper bound on joined vote rows read per scoreboard computation
pub const DEFAULT_SCOREBOARD_LIMIT: usize = 5000;

/// Default maximum accepted upload body (20 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Default outbound HTTP timeout applied uniformly to every remote call
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Bootstrap configuration loaded from TOML
///
/// Every field has a built-in default so a partial (or absent) file is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// HTTP bind address (`host:port`)
    pub bind: String,

    /// SQLite database file; defaults to the platform data directory
    pub database_path: Option<PathBuf>,

    /// Base URL of the caption-generation service
    pub api_base: String,

    /// Base URL of the identity provider that validates bearer tokens
    pub auth_url: Option<String>,

    /// Public API key sent to the identity provider alongside the bearer token
    pub auth_api_key: Option<String>,

    /// Maximum joined vote rows per scoreboard read (silent truncation)
    pub scoreboard_limit: usize,

    /// Maximum accepted request body for uploads
    pub max_upload_bytes: usize,

    /// Outbound HTTP timeout in seconds
    pub http_timeout_secs: u64,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            database_path: None,
            api_base: DEFAULT_API_BASE.to_string(),
            auth_url: None,
            auth_api_key: None,
            scoreboard_limit: DEFAULT_SCOREBOARD_LIMIT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            logging: LoggingConfig::default(),
        }
    }
}

/// Values supplied on the command line or through the environment
///
/// `None` means "not supplied"; the TOML value (or default) is kept.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind: Option<String>,
    pub database_path: Option<PathBuf>,
    pub api_base: Option<String>,
    pub auth_url: Option<String>,
    pub auth_api_key: Option<String>,
    pub log_level: Option<String>,
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Apply command-line/environment overrides on top of file values
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(bind) = overrides.bind {
            self.bind = bind;
        }
        if let Some(path) = overrides.database_path {
            self.database_path = Some(path);
        }
        if let Some(api_base) = overrides.api_base {
            self.api_base = api_base;
        }
        if let Some(auth_url) = overrides.auth_url {
            self.auth_url = Some(auth_url);
        }
        if let Some(key) = overrides.auth_api_key {
            self.auth_api_key = Some(key);
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        self
    }

    /// Resolved database path (configured value or platform default)
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }

    /// Identity provider URL, required for any authenticated route
    pub fn require_auth_url(&self) -> Result<&str> {
        match self.auth_url.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(url),
            _ => Err(Error::Config(
                "Identity provider URL not configured. Set one of:\n\
                 1. Command line: --auth-url https://<project>.supabase.co\n\
                 2. Environment: HUMOR_AUTH_URL=https://<project>.supabase.co\n\
                 3. TOML config: auth_url = \"https://<project>.supabase.co\""
                    .to_string(),
            )),
        }
    }
}

/// Where the bootstrap configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// File path resolved but nothing there; defaults used
    Missing(PathBuf),
    /// No config directory on this platform; defaults used
    Defaults,
}

/// Load bootstrap configuration
///
/// Uses `path` when given, otherwise the platform config file. A missing file
/// yields defaults; an unreadable or malformed file is an error. Nothing is
/// logged here because this runs before the tracing subscriber exists.
pub fn load_toml_config(path: Option<&Path>) -> Result<(TomlConfig, ConfigSource)> {
    let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(path) => path,
        None => return Ok((TomlConfig::default(), ConfigSource::Defaults)),
    };

    if !path.exists() {
        return Ok((TomlConfig::default(), ConfigSource::Missing(path)));
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config = TomlConfig::from_toml_str(&content)?;
    Ok((config, ConfigSource::File(path)))
}

/// Platform config file: `~/.config/humor/humor.toml` on Linux
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("humor").join("humor.toml"))
}

/// Platform default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("humor").join("humor.db"))
        .unwrap_or_else(|| PathBuf::from("./humor_data/humor.db"))
}
