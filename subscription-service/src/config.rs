//! Configuration for subscription-service.

use serde::Deserialize;
use service_core::config::load_from_env;
use service_core::error::AppError;

/// Database connection settings.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Top-level settings, loaded from the optional `configuration` file plus
/// `APP__`-prefixed environment variables (e.g. `APP__DATABASE__URL`).
#[derive(Debug, Deserialize, Clone)]
pub struct SubscriptionConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub database: DatabaseConfig,
}

fn default_service_name() -> String {
    "subscription-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl SubscriptionConfig {
    pub fn from_env() -> Result<Self, AppError> {
        load_from_env()
    }
}
