//! Ambient configuration
//!
//! Serializable settings loaded in three layers: built-in defaults, an
//! optional TOML file, and `STRATUM_`-prefixed environment variables
//! (nested keys split on `__`, e.g. `STRATUM_SERVER__PORT=9090`). The
//! result can seed a kernel [`ServerPlatformConfig`]; everything
//! non-serializable (constructors, live handles) stays programmatic.

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use stratum_domain::constants::{CONFIG_FILE, DEFAULT_HOST, DEFAULT_PORT, ENV_CONFIG_PREFIX};
use stratum_domain::error::{Error, Result};
use stratum_domain::value_objects::{DataVendor, ServerVendor};

use crate::kernel::{DatabaseConfig, ServerPlatformConfig};

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// HTTP engine vendor
    pub vendor: ServerVendor,
    /// Bind host
    pub host: String,
    /// Listen port
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            vendor: ServerVendor::Axum,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Data engine vendor
    pub vendor: DataVendor,
    /// Connection string, required for postgres
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            vendor: DataVendor::Memory,
            url: String::new(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Emit JSON instead of human-readable lines
    pub json_format: bool,
    /// Optional daily-rolling log file
    pub file_output: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            file_output: None,
        }
    }
}

/// Ambient application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Database settings
    #[serde(default)]
    pub database: DatabaseSettings,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load from the default file location plus the environment
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Load from an explicit file path plus the environment
    pub fn load_from(path: &Path) -> Result<Self> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_CONFIG_PREFIX).split("__"))
            .extract()
            .map_err(|e| {
                Error::configuration(format!("failed to load configuration: {e}"))
                    .with_source(e)
                    .with_component("config")
                    .with_operation("load")
            })
    }

    /// Seed a kernel server platform from these settings
    pub fn server_platform(&self) -> ServerPlatformConfig {
        let database = match self.database.vendor {
            DataVendor::Memory => DatabaseConfig::memory(),
            DataVendor::Postgres => DatabaseConfig::postgres(self.database.url.clone()),
        };
        ServerPlatformConfig {
            vendor: self.server.vendor,
            host: self.server.host.clone(),
            port: self.server.port,
            databases: vec![database],
            ..ServerPlatformConfig::default()
        }
    }
}
