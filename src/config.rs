use crate::core::db::{ConnectionSettings, DEFAULT_URI};
use crate::core::{Result, SessionError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub connection: Option<ConnectionConfig>,
    pub session: Option<SessionConfig>,
}

/// How to reach the server.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectionConfig {
    pub uri: Option<String>,
    pub tls_ca_file: Option<PathBuf>,
    pub app_name: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub server_selection_timeout_ms: Option<u64>,
    pub ping_on_connect: Option<bool>,
}

/// Selections applied after connecting, and session behavior.
#[derive(Debug, Default, Deserialize)]
pub struct SessionConfig {
    pub database: Option<String>,
    pub collection: Option<String>,
    pub ordered_inserts: Option<bool>,
}

impl Config {
    /// Builds driver settings, falling back to defaults for unset keys.
    pub fn connection_settings(&self) -> ConnectionSettings {
        let defaults = ConnectionSettings::default();
        let connection = self.connection.as_ref();
        let session = self.session.as_ref();

        ConnectionSettings {
            uri: connection
                .and_then(|c| c.uri.clone())
                .unwrap_or_else(|| DEFAULT_URI.to_string()),
            tls_ca_file: connection.and_then(|c| c.tls_ca_file.clone()),
            app_name: connection.and_then(|c| c.app_name.clone()),
            connect_timeout: connection
                .and_then(|c| c.connect_timeout_ms)
                .map(Duration::from_millis),
            server_selection_timeout: connection
                .and_then(|c| c.server_selection_timeout_ms)
                .map(Duration::from_millis),
            ping_on_connect: connection
                .and_then(|c| c.ping_on_connect)
                .unwrap_or(defaults.ping_on_connect),
            ordered_inserts: session
                .and_then(|s| s.ordered_inserts)
                .unwrap_or(defaults.ordered_inserts),
        }
    }

    pub fn default_database(&self) -> Option<&str> {
        self.session.as_ref()?.database.as_deref()
    }

    pub fn default_collection(&self) -> Option<&str> {
        self.session.as_ref()?.collection.as_deref()
    }

    /// Rejects values the driver would only fail on later.
    pub fn validate(&self) -> Result<()> {
        if let Some(connection) = &self.connection {
            if matches!(connection.uri.as_deref(), Some(uri) if uri.trim().is_empty()) {
                return Err(SessionError::Config("connection.uri cannot be empty".to_string()));
            }
            if connection.connect_timeout_ms == Some(0) {
                return Err(SessionError::Config(
                    "connection.connect_timeout_ms must be positive".to_string(),
                ));
            }
            if connection.server_selection_timeout_ms == Some(0) {
                return Err(SessionError::Config(
                    "connection.server_selection_timeout_ms must be positive".to_string(),
                ));
            }
        }
        if self.default_collection().is_some() && self.default_database().is_none() {
            return Err(SessionError::Config(
                "session.collection requires session.database".to_string(),
            ));
        }
        Ok(())
    }
}

/// Location of the configuration file when none is given explicitly.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mongoconnect").join("config.toml"))
}

/// Loads configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
///
/// # Example
///
/// ```no_run
/// let config = mongoconnect::config::load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)
        .map_err(|e| SessionError::Config(format!("{}: {}", path.display(), e)))?;
    config.validate()?;
    Ok(config)
}

/// Loads the file at the default location, or defaults when it does not exist.
pub fn load_default_config() -> Result<Config> {
    match default_config_path() {
        Some(path) if path.exists() => load_config(path),
        _ => Ok(Config::default()),
    }
}
