// Runtime configuration
//
// Loaded once at startup from an optional TOML file, then environment
// overrides. The resulting value is passed explicitly to logging and the client.

pub mod credentials;
pub mod mcp_export;

pub use credentials::{resolve_api_key, resolve_api_key_from_env, ApiKey};

use crate::mackerel::error::MackerelError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.mackerelio.com/api/v0";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const BASE_URL_ENV: &str = "MACKEREL_BASE_URL";
const TIMEOUT_ENV: &str = "MACKEREL_TIMEOUT_SECS";
const LOG_FORMAT_ENV: &str = "MACKEREL_MCP_LOG_FORMAT";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub mackerel: MackerelConfig,
    pub logging: LoggingConfig,
}

/// Mackerel API settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MackerelConfig {
    /// Lowest-precedence key source; the environment and `--api-key` win
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for MackerelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl MackerelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Log output settings. `RUST_LOG` overrides `level` when set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => anyhow::bail!("Unknown log format '{}'. Use: json or pretty", other),
        }
    }
}

impl Config {
    /// Default config file location, e.g. `~/.config/mackerel-mcp/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "mackerel-mcp")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default location is used
    /// when present and built-in defaults otherwise. Environment overrides are
    /// applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => {
                let expanded = expand_path(path);
                Self::from_file(&expanded)?
            }
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env_overrides(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply `MACKEREL_BASE_URL`, `MACKEREL_TIMEOUT_SECS` and `MACKEREL_MCP_LOG_FORMAT`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.mackerel.base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            self.mackerel.timeout_secs = raw
                .trim()
                .parse()
                .with_context(|| format!("{TIMEOUT_ENV} must be a whole number of seconds"))?;
        }
        if let Some(raw) = lookup(LOG_FORMAT_ENV) {
            self.logging.format = raw.parse()?;
        }
        Ok(())
    }

    /// Resolve the API key once: `explicit` (CLI flag), then the environment,
    /// then the config file.
    pub fn resolve_api_key(&self, explicit: Option<&str>) -> crate::mackerel::Result<ApiKey> {
        self.resolve_api_key_with(explicit, |var| std::env::var(var).ok())
    }

    pub fn resolve_api_key_with<F>(
        &self,
        explicit: Option<&str>,
        lookup: F,
    ) -> crate::mackerel::Result<ApiKey>
    where
        F: Fn(&str) -> Option<String>,
    {
        match resolve_api_key(explicit, lookup) {
            Ok(key) => Ok(key),
            Err(err @ MackerelError::Configuration { .. }) => self
                .mackerel
                .api_key
                .as_deref()
                .and_then(ApiKey::new)
                .ok_or(err),
            Err(err) => Err(err),
        }
    }
}

fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(raw) => PathBuf::from(shellexpand::tilde(raw).into_owned()),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.mackerel.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.mackerel.timeout_secs, 30);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.mackerel.api_key.is_none());
    }

    #[test]
    fn test_from_file_fills_missing_fields_with_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "[mackerel]\ntimeout_secs = 5\n\n[logging]\nformat = \"pretty\"\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.mackerel.timeout_secs, 5);
        assert_eq!(config.mackerel.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope.toml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_overrides(env(&[
                (BASE_URL_ENV, "http://127.0.0.1:8080/api/v0"),
                (TIMEOUT_ENV, "12"),
                (LOG_FORMAT_ENV, "pretty"),
            ]))
            .unwrap();
        assert_eq!(config.mackerel.base_url, "http://127.0.0.1:8080/api/v0");
        assert_eq!(config.mackerel.timeout(), Duration::from_secs(12));
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_bad_timeout_override_is_error() {
        let mut config = Config::default();
        let result = config.apply_env_overrides(env(&[(TIMEOUT_ENV, "soon")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_api_key_precedence() {
        let config = Config {
            mackerel: MackerelConfig {
                api_key: Some("from-file".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let key = config
            .resolve_api_key_with(Some("from-flag"), env(&[("MACKEREL_API_KEY", "from-env")]))
            .unwrap();
        assert_eq!(key.expose(), "from-flag");

        let key = config
            .resolve_api_key_with(None, env(&[("MACKEREL_API_KEY", "from-env")]))
            .unwrap();
        assert_eq!(key.expose(), "from-env");

        let key = config.resolve_api_key_with(None, env(&[])).unwrap();
        assert_eq!(key.expose(), "from-file");
    }

    #[test]
    fn test_api_key_missing_everywhere() {
        let err = Config::default()
            .resolve_api_key_with(None, env(&[]))
            .unwrap_err();
        assert!(matches!(err, MackerelError::Configuration { .. }));
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let config = Config::default();
        let rendered = toml::to_string(&config).unwrap();
        assert!(rendered.contains("base_url"));
        assert!(!rendered.contains("api_key"));
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
