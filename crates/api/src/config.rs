//! Application configuration loaded from environment variables.

use std::path::PathBuf;

use domain::StatusPathPolicy;
use orders::CoreConfig;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string (default: in-memory store)
/// - `ORDER_TX_ATTEMPTS`: runs per transaction on serialization failures (default: `3`)
/// - `ORDER_NUMBER_ATTEMPTS`: order number candidates per create (default: `5`)
/// - `ORDER_STATUS_PATH`: `single_hop` or `walk` (default: `single_hop`)
/// - `SEED_FILE`: JSON file of businesses, customers, zones and variants to load at startup
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub seed_file: Option<PathBuf>,
    pub core: CoreConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let mut core = defaults.core;
        if let Some(attempts) = lookup("ORDER_TX_ATTEMPTS").and_then(|v| v.parse().ok()) {
            core = core.with_tx_attempts(attempts);
        }
        if let Some(attempts) = lookup("ORDER_NUMBER_ATTEMPTS").and_then(|v| v.parse().ok()) {
            core = core.with_number_attempts(attempts);
        }
        if let Some(policy) =
            lookup("ORDER_STATUS_PATH").and_then(|v| v.parse::<StatusPathPolicy>().ok())
        {
            core = core.with_status_path(policy);
        }

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            seed_file: lookup("SEED_FILE")
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
            core,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            seed_file: None,
            core: CoreConfig::default(),
        }
    }
}
