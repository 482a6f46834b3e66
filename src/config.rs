//! Configuration for the bridge.
//!
//! Layered loading, lowest to highest priority:
//! 1. Default values (embedded in the structs)
//! 2. TOML configuration file (default: `config/relaybox.toml`, overridable
//!    via `RELAYBOX_CONFIG`)
//! 3. Environment variables with the pattern `RELAYBOX__<section>__<key>`,
//!    e.g. `RELAYBOX__SERVER__PORT=8070`

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use config::{Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_ENV_VAR: &str = "RELAYBOX_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/relaybox.toml";
const ENV_PREFIX: &str = "RELAYBOX";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Listener settings. The bridge is loopback-only; port 0 binds an ephemeral
/// port which the handle reports back to the embedding process.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 0,
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

/// Defaults applied when a descriptor leaves a knob unset.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl EngineConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_redirects: default_max_redirects(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_max_payload_bytes() -> usize {
    32 * 1024 * 1024 // 32 MB
}

fn default_user_agent() -> String {
    format!("relaybox/{}", env!("CARGO_PKG_VERSION"))
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    90
}

fn default_max_redirects() -> usize {
    10
}

impl Config {
    /// Load configuration from all sources (file + environment).
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file doesn't exist)
        let _ = dotenvy::dotenv();

        let config_path = env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        Self::load_from_path(config_path)
    }

    /// Load configuration from a specific path plus environment overrides.
    pub fn load_from_path(config_path: PathBuf) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if config_path.exists() {
            tracing::info!(path = %config_path.display(), "loading configuration file");
            builder = builder.add_source(File::from(config_path).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_no_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from_path(temp_dir.path().join("missing.toml")).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 0);
        assert_eq!(config.server.max_payload_bytes, 32 * 1024 * 1024);
        assert_eq!(config.engine.max_redirects, 10);
        assert_eq!(config.engine.request_timeout(), Duration::from_secs(90));
    }

    #[test]
    fn parses_directly_from_toml() {
        let config: Config = toml::from_str(
            r#"
[server]
host = "0.0.0.0"
port = 8070
        "#,
        )
        .unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8070);
        assert_eq!(config.engine.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn loads_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("relaybox.toml");

        let toml_content = r#"
[server]
port = 8070
max_payload_bytes = 1048576

[engine]
user_agent = "test-agent/1.0"
request_timeout_secs = 5
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.server.port, 8070);
        assert_eq!(config.server.max_payload_bytes, 1048576);
        assert_eq!(config.engine.user_agent, "test-agent/1.0");
        assert_eq!(config.engine.request_timeout(), Duration::from_secs(5));
        // untouched sections keep their defaults
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.engine.max_redirects, 10);
    }
}
