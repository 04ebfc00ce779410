//! Configuration loading and typed config structures for simgate.
//!
//! The configuration lives in `simgate-config.yaml`. Every section and
//! field has a default, so an empty file (or no file at all) yields a
//! working setup. Webhook definitions live in their own file, named by
//! `hooks_file`, and are parsed by the hooks crate.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration, mirroring `simgate-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimgateConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Main-thread bridge settings.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Snapshot cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Simulation host settings.
    #[serde(default)]
    pub host: HostConfig,

    /// Servlet and integration enable flags.
    #[serde(default)]
    pub servlets: ServletsConfig,

    /// Error reporting settings.
    #[serde(default)]
    pub reporting: ReportingConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Path of the webhook configuration file.
    #[serde(default = "default_hooks_file")]
    pub hooks_file: PathBuf,
}

impl SimgateConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for the listener:
    /// - `SIMGATE_HOST` overrides `server.host`
    /// - `SIMGATE_PORT` overrides `server.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.server.apply_env_overrides();
        Ok(config)
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Address the listener binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the listener binds to.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SIMGATE_HOST") {
            self.host = val;
        }
        if let Ok(val) = std::env::var("SIMGATE_PORT") {
            match val.parse() {
                Ok(port) => self.port = port,
                Err(_invalid) => {
                    tracing::warn!(value = %val, "Ignoring invalid SIMGATE_PORT");
                }
            }
        }
    }
}

/// Main-thread bridge configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BridgeConfig {
    /// How long a caller waits for the simulation thread.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

/// Snapshot cache configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    /// Age after which a cached snapshot is recaptured. Unset means
    /// entries only refresh on invalidation or a full list.
    #[serde(default)]
    pub ttl_ms: Option<u64>,
}

/// Simulation host configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HostConfig {
    /// Milliseconds between simulation ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

/// Servlet and integration enable flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServletsConfig {
    /// Per object kind: whether the HTTP adapter exposes it. Kinds not
    /// listed are enabled.
    #[serde(default)]
    pub enabled: BTreeMap<String, bool>,

    /// Per optional integration: whether it may be activated. Integrations
    /// not listed are enabled if present.
    #[serde(default)]
    pub integrations: BTreeMap<String, bool>,

    /// Declared requests per second per operation name. Enforced by the
    /// routing layer.
    #[serde(default)]
    pub rate_limit: BTreeMap<String, u32>,
}

impl ServletsConfig {
    /// Whether the servlet for `kind` is enabled.
    pub fn servlet_enabled(&self, kind: &str) -> bool {
        self.enabled.get(kind).copied().unwrap_or(true)
    }

    /// Whether the integration `name` is allowed by configuration.
    pub fn integration_enabled(&self, name: &str) -> bool {
        self.integrations.get(name).copied().unwrap_or(true)
    }
}

/// Error reporting configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ReportingConfig {
    /// Whether internal failures are forwarded to the error tracker.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Development mode: forces reporting off.
    #[serde(default)]
    pub dev_mode: bool,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dev_mode: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

const fn default_call_timeout_ms() -> u64 {
    5_000
}

const fn default_tick_interval_ms() -> u64 {
    50
}

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_hooks_file() -> PathBuf {
    PathBuf::from("hooks.yaml")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config = SimgateConfig::parse("").unwrap();
        assert_eq!(config.bridge.call_timeout_ms, 5_000);
        assert_eq!(config.cache.ttl_ms, None);
        assert_eq!(config.host.tick_interval_ms, 50);
        assert!(config.reporting.enabled);
        assert_eq!(config.hooks_file, PathBuf::from("hooks.yaml"));
    }

    #[test]
    fn parses_sections() {
        let yaml = r"
bridge:
  call_timeout_ms: 250
cache:
  ttl_ms: 1000
servlets:
  enabled:
    entity: false
  integrations:
    economy: false
  rate_limit:
    player.list: 20
reporting:
  dev_mode: true
logging:
  level: debug
";
        let config = SimgateConfig::parse(yaml).unwrap();
        assert_eq!(config.bridge.call_timeout_ms, 250);
        assert_eq!(config.cache.ttl_ms, Some(1000));
        assert!(!config.servlets.servlet_enabled("entity"));
        assert!(config.servlets.servlet_enabled("player"));
        assert!(!config.servlets.integration_enabled("economy"));
        assert!(config.servlets.integration_enabled("regions"));
        assert_eq!(config.servlets.rate_limit.get("player.list"), Some(&20));
        assert!(config.reporting.dev_mode);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let err = SimgateConfig::parse("bridge: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }
}
