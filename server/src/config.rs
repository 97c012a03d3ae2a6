//! Server configuration.
//!
//! Loaded from a TOML file at startup. Every field has a sensible default
//! so the server runs with no configuration file at all.

use serde::{Deserialize, Serialize};

/// Complete server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Network settings.
    pub network: NetworkSettings,
    /// Session persistence settings.
    pub sessions: SessionSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Address and port the HTTP listener binds to.
    pub bind_address: String,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".into(),
        }
    }
}

/// Session persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// File the session table is snapshotted to so sessions survive a
    /// restart.
    pub file: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            file: "server_sessions.json".into(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default log level when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl ServerConfig {
    /// Load the configuration from a TOML file. A missing file yields the
    /// defaults; a present-but-invalid file is an error.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(toml::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = ServerConfig::load("/definitely/not/there.toml").unwrap();
        assert_eq!(config.network.bind_address, "127.0.0.1:8080");
        assert_eq!(config.sessions.file, "server_sessions.json");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config: ServerConfig =
            toml::from_str("[network]\nbind_address = \"0.0.0.0:9999\"\n").unwrap();
        assert_eq!(config.network.bind_address, "0.0.0.0:9999");
        assert_eq!(config.logging.level, "info");
    }
}
