//! Configuration file parsing and structures.
//!
//! aldesd uses a single TOML file. Every section is optional; an empty file
//! yields a daemon with the HTTP API on its default address and no integrations.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;

/// Top-level configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"aldesd::engine" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

impl LoggingConfig {
    /// Build the subscriber filter: the global level plus one directive per override.
    pub fn targets(&self) -> Targets {
        self.overrides.iter().fold(
            Targets::new().with_default(LevelFilter::from(self.level)),
            |targets, (target, level)| targets.with_target(target.clone(), LevelFilter::from(*level)),
        )
    }
}

fn default_true() -> bool {
    true
}

fn default_listen() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8565
}

/// Native HTTP API configuration
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_listen(),
            port: default_port(),
        }
    }
}

/// Integration configuration container
#[derive(Debug, Default, Deserialize)]
pub struct IntegrationsConfig {
    /// AldesConnect thermostats; the integration is only started when this section exists
    #[serde(default)]
    pub aldesconnect: Option<AldesConnectConfig>,
}

/// Configuration for the AldesConnect integration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AldesConnectConfig {
    /// Config entries, keyed by entry id. Ordered so setup is deterministic.
    #[serde(default)]
    pub entries: BTreeMap<String, AldesConnectEntryConfig>,
}

/// One configured Aldes account
#[derive(Debug, Clone, Deserialize)]
pub struct AldesConnectEntryConfig {
    /// Display title of the entry; defaults to the entry id
    #[serde(default)]
    pub title: Option<String>,

    /// JSON dump of the products list to seed the coordinator with at startup
    #[serde(default)]
    pub products_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        toml::from_str(&contents).map_err(ConfigError::Parse)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.api.enabled);
        assert_eq!(config.api.listen, "127.0.0.1");
        assert_eq!(config.api.port, 8565);
        assert!(config.integrations.aldesconnect.is_none());
    }

    #[test]
    fn test_parse_aldesconnect_entries() {
        let toml = r#"
            [logging]
            level = "debug"
            overrides = { "aldesd::engine" = "warn" }

            [api]
            port = 9000

            [integrations.aldesconnect.entries.home]
            title = "Home"
            products_file = "/var/lib/aldesd/home.json"

            [integrations.aldesconnect.entries.cabin]
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(
            config.logging.overrides.get("aldesd::engine"),
            Some(&LogLevel::Warn)
        );
        assert_eq!(config.api.port, 9000);

        let aldes = config.integrations.aldesconnect.unwrap();
        let ids: Vec<&str> = aldes.entries.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["cabin", "home"]);

        let home = &aldes.entries["home"];
        assert_eq!(home.title.as_deref(), Some("Home"));
        assert_eq!(
            home.products_file.as_deref(),
            Some(Path::new("/var/lib/aldesd/home.json"))
        );
        assert!(aldes.entries["cabin"].products_file.is_none());
    }

    #[test]
    fn test_invalid_log_level_is_rejected() {
        let result: Result<Config, _> = toml::from_str("[logging]\nlevel = \"loud\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_, _)));
    }
}
