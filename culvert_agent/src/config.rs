//! On-disk configuration.
//!
//! One YAML file holds the endpoint addresses and the stored token. It is
//! loaded once in `main` and passed by reference; the token is written back
//! after every auth flow.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to write config: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// The stored OAuth token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub id_token: String,
}

/// Agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub hostname: String,
    pub debug_hostname: String,
    pub upstream: String,
    pub debug_upstream: String,
    /// Device controller's WebSocket endpoint.
    pub moonraker_ws: String,
    /// Device controller's HTTP file endpoint.
    pub moonraker_http: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Token>,
}

impl Config {
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is unreadable or not valid YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be written.
    pub fn store(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let raw = serde_yaml::to_string(self)?;
        std::fs::write(path, raw).map_err(ConfigError::Write)
    }

    /// The cloud HTTP origin, honoring `--debug`.
    #[must_use]
    pub fn hostname(&self, debug: bool) -> &str {
        if debug {
            &self.debug_hostname
        } else {
            &self.hostname
        }
    }

    /// The cloud WebSocket endpoint, honoring `--debug`.
    #[must_use]
    pub fn upstream(&self, debug: bool) -> &str {
        if debug {
            &self.debug_upstream
        } else {
            &self.upstream
        }
    }

    /// Persist a freshly issued token.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be written.
    pub fn store_token(&mut self, path: impl AsRef<Path>, token: Token) -> Result<(), ConfigError> {
        self.token = Some(token);
        self.store(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    fn sample() -> Config {
        Config {
            hostname: "https://cloud.example".into(),
            debug_hostname: "http://localhost:8080".into(),
            upstream: "wss://cloud.example/ws".into(),
            debug_upstream: "ws://localhost:8080/ws".into(),
            moonraker_ws: "ws://127.0.0.1:7125/websocket".into(),
            moonraker_http: "http://127.0.0.1:7125".into(),
            token: None,
        }
    }

    #[test]
    fn survives_a_store_load_cycle() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yaml");

        let config = sample();
        config.store(&path)?;
        let loaded = Config::load(&path)?;

        assert_eq!(loaded.hostname, config.hostname);
        assert_eq!(loaded.moonraker_ws, config.moonraker_ws);
        assert!(loaded.token.is_none());
        Ok(())
    }

    #[test]
    fn store_token_persists_the_token() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yaml");

        let mut config = sample();
        config.store(&path)?;

        let token = Token {
            access_token: "at".into(),
            token_type: "Bearer".into(),
            expires_at: Utc::now(),
            refresh_token: "rt".into(),
            id_token: "it".into(),
        };
        config.store_token(&path, token.clone())?;

        let loaded = Config::load(&path)?;
        assert_eq!(loaded.token, Some(token));
        Ok(())
    }

    #[test]
    fn debug_flag_selects_the_debug_endpoints() {
        let config = sample();
        assert_eq!(config.hostname(false), "https://cloud.example");
        assert_eq!(config.hostname(true), "http://localhost:8080");
        assert_eq!(config.upstream(false), "wss://cloud.example/ws");
        assert_eq!(config.upstream(true), "ws://localhost:8080/ws");
    }
}
