//! Configuration loading
//!
//! Bootstrap settings come from a small TOML file. Each setting resolves in
//! priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing config file is not an error; the defaults apply. A config file
//! named explicitly (flag or `IPQC_CONFIG`) must exist and parse.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Environment variable naming the backend base URL
pub const ENV_BACKEND_URL: &str = "IPQC_BACKEND_URL";

/// Environment variable naming the config file
pub const ENV_CONFIG: &str = "IPQC_CONFIG";

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Base URL of the audit-record backend
    #[serde(default)]
    pub backend_url: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Where generated reports are written (optional, current directory if not set)
    #[serde(default)]
    pub report_dir: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            report_dir: None,
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML {:?}: {}", path, e)))
    }
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub backend_url: Option<String>,
    pub log_level: Option<String>,
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub backend_url: String,
    pub request_timeout: Duration,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub report_dir: PathBuf,
}

impl Settings {
    /// Resolve settings from overrides, environment, config file and defaults
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        let toml_config = match config_file_path(overrides.config_path.as_deref()) {
            ConfigLocation::Explicit(path) => {
                let config = TomlConfig::load(&path)?;
                info!("Loaded TOML configuration from {:?}", path);
                config
            }
            ConfigLocation::Discovered(path) => match TomlConfig::load(&path) {
                Ok(config) => {
                    info!("Loaded TOML configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("{}; using defaults", e);
                    TomlConfig::default()
                }
            },
            ConfigLocation::None => {
                debug!("No config file found, using defaults");
                TomlConfig::default()
            }
        };

        Ok(Self::from_sources(overrides, &toml_config))
    }

    /// Apply the priority order to an already-loaded config file
    pub fn from_sources(overrides: &ConfigOverrides, toml_config: &TomlConfig) -> Self {
        let backend_url = overrides
            .backend_url
            .clone()
            .or_else(|| std::env::var(ENV_BACKEND_URL).ok().filter(|v| !v.trim().is_empty()))
            .or_else(|| toml_config.backend_url.clone())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let log_level = overrides
            .log_level
            .clone()
            .unwrap_or_else(|| toml_config.logging.level.clone());

        Self {
            backend_url: backend_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(toml_config.request_timeout_secs),
            log_level,
            log_file: toml_config.logging.file.clone(),
            report_dir: toml_config
                .report_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_sources(&ConfigOverrides::default(), &TomlConfig::default())
    }
}

enum ConfigLocation {
    Explicit(PathBuf),
    Discovered(PathBuf),
    None,
}

fn config_file_path(cli_arg: Option<&Path>) -> ConfigLocation {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return ConfigLocation::Explicit(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ENV_CONFIG) {
        if !path.trim().is_empty() {
            return ConfigLocation::Explicit(PathBuf::from(path));
        }
    }

    // Priority 3: platform config locations
    default_config_paths()
        .into_iter()
        .find(|path| path.exists())
        .map(ConfigLocation::Discovered)
        .unwrap_or(ConfigLocation::None)
}

/// Candidate config files, user location first
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("ipqc").join("config.toml"));
    }
    if cfg!(unix) {
        paths.push(PathBuf::from("/etc/ipqc/config.toml"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.logging.level, "info");
        assert!(config.backend_url.is_none());
    }

    #[test]
    fn test_partial_toml() {
        let config: TomlConfig = toml::from_str(
            r#"
            backend_url = "http://qa-server:8000"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.backend_url.as_deref(), Some("http://qa-server:8000"));
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_cli_override_wins() {
        let overrides = ConfigOverrides {
            backend_url: Some("http://cli:9000/".into()),
            log_level: Some("trace".into()),
            ..Default::default()
        };
        let toml_config = TomlConfig {
            backend_url: Some("http://file:8000".into()),
            ..Default::default()
        };
        let settings = Settings::from_sources(&overrides, &toml_config);
        assert_eq!(settings.backend_url, "http://cli:9000");
        assert_eq!(settings.log_level, "trace");
    }
}
