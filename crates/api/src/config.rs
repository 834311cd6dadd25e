//! Dashboard Configuration
//!
//! Serde defaults, overridden by an optional TOML file and then by
//! `BINWATCH__*` environment variables (e.g. `BINWATCH__SERVER__ADDR`).

use alerting::{AlertConfig, UserSettings};
use config::{Config, ConfigError, Environment, File};
use feed::DriverConfig;
use insights::InsightsConfig;
use serde::Deserialize;
use telemetry::{default_seeds, BinSeed, TickConfig};

use crate::rate_limit::RateLimitConfig;

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "binwatch";

/// HTTP server and logging options
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    /// One of trace, debug, info, warn, error
    pub log_level: String,
    /// Emit logs as JSON lines
    pub json_logs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Complete process configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub server: ServerConfig,
    pub driver: DriverConfig,
    pub tick: TickConfig,
    pub alerts: AlertConfig,
    /// Settings in effect until changed through the API
    pub settings: UserSettings,
    pub insights: InsightsConfig,
    pub rate_limit: RateLimitConfig,
    /// Bin population created at startup
    pub bins: Vec<BinSeed>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            driver: DriverConfig::default(),
            tick: TickConfig::default(),
            alerts: AlertConfig::default(),
            settings: UserSettings::default(),
            insights: InsightsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            bins: default_seeds(),
        }
    }
}

impl DashboardConfig {
    /// Load configuration. An explicit `path` must exist; the default file is
    /// optional.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::with_name(path),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("BINWATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
