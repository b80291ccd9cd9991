//! TOML configuration: server bind address, executor endpoint, database
//! path. Layered loading with sensible defaults and an environment variable
//! override for the config file path.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::run::executor::ExecutorConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub executor: ExecutorSettings,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorSettings {
    #[serde(default = "default_executor_url")]
    pub url: String,
    /// Seconds; 0 falls back to the 300s default.
    #[serde(default)]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_executor_url() -> String {
    "http://127.0.0.1:8765".to_string()
}

fn default_db_path() -> String {
    "data/testdeck.db".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            url: default_executor_url(),
            timeout_secs: 0,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Try to load configuration from, in order:
    /// 1. The path specified by the `TESTDECK_CONFIG` environment variable.
    /// 2. `testdeck.toml` in the working directory.
    /// 3. Fall back to compiled-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var("TESTDECK_CONFIG") {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "TESTDECK_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let local = Path::new("testdeck.toml");
        if local.exists() {
            match Self::load(local) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(error = %e, "testdeck.toml present but unusable, using defaults");
                }
            }
        }

        Self::default()
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::new(
            self.executor.url.clone(),
            Duration::from_secs(self.executor.timeout_secs),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.storage.db_path, "data/testdeck.db");
        // Zero timeout means "use the 300s default" downstream.
        assert_eq!(
            config.executor_config().timeout,
            Duration::from_secs(300)
        );
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            "[executor]\nurl = \"http://runner:9000\"\ntimeout_secs = 60\n",
        )
        .unwrap();
        assert_eq!(config.executor.url, "http://runner:9000");
        assert_eq!(config.executor_config().timeout, Duration::from_secs(60));
        assert_eq!(config.server.bind, "0.0.0.0:8080");
    }
}
