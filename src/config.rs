use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

const DEFAULT_ENV: &str = "development";
const DEFAULT_LOG_LEVEL: &str = "info";
const CONFIG_DIR: &str = "config";
const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 5;
const DEFAULT_RESERVATION_TTL_HOURS: i64 = 48;
const DEFAULT_SAFETY_STOCK: i32 = 0;
const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 300;

/// Tunables for the stock core, injected into services rather than read from
/// a process-wide singleton.
#[derive(Clone, Debug, Deserialize)]
pub struct StockSettings {
    /// Upper bound on a single lock-acquiring transaction.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    /// Age after which an unapproved transfer's reservation is swept away.
    #[serde(default = "default_reservation_ttl_hours")]
    pub reservation_ttl_hours: i64,

    /// Safety stock applied to holdings created implicitly by a transfer
    /// credit.
    #[serde(default = "default_safety_stock")]
    pub default_safety_stock: i32,

    /// Cadence suggestion for the periodic reconciliation sweep.
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
}

impl Default for StockSettings {
    fn default() -> Self {
        Self {
            lock_timeout_secs: DEFAULT_LOCK_TIMEOUT_SECS,
            reservation_ttl_hours: DEFAULT_RESERVATION_TTL_HOURS,
            default_safety_stock: DEFAULT_SAFETY_STOCK,
            reconcile_interval_secs: DEFAULT_RECONCILE_INTERVAL_SECS,
        }
    }
}

impl StockSettings {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn reservation_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.reservation_ttl_hours)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }
}

/// Application configuration, layered from defaults, an optional
/// `config/{environment}.toml`, and `STOCKCORE_`-prefixed environment
/// variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub stock: StockSettings,
}

impl AppConfig {
    /// Loads configuration for the environment named by `RUN_ENV` (defaults
    /// to development). Environment variables win over files: e.g.
    /// `STOCKCORE_DATABASE_URL`, `STOCKCORE_STOCK__LOCK_TIMEOUT_SECS`.
    pub fn load() -> Result<Self, ConfigError> {
        let run_env = env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        Config::builder()
            .set_default("database_url", "sqlite::memory:")?
            .set_default("environment", run_env.clone())?
            .set_default("log_level", DEFAULT_LOG_LEVEL)?
            .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
            .add_source(Environment::with_prefix("STOCKCORE").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_lock_timeout_secs() -> u64 {
    DEFAULT_LOCK_TIMEOUT_SECS
}

fn default_reservation_ttl_hours() -> i64 {
    DEFAULT_RESERVATION_TTL_HOURS
}

fn default_safety_stock() -> i32 {
    DEFAULT_SAFETY_STOCK
}

fn default_reconcile_interval_secs() -> u64 {
    DEFAULT_RECONCILE_INTERVAL_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_settings_defaults() {
        let settings = StockSettings::default();
        assert_eq!(settings.lock_timeout(), Duration::from_secs(5));
        assert_eq!(settings.reservation_ttl(), chrono::Duration::hours(48));
        assert_eq!(settings.default_safety_stock, 0);
    }

    #[test]
    fn app_config_deserializes_with_defaults() {
        let cfg: AppConfig = Config::builder()
            .set_default("database_url", "sqlite::memory:")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.environment, "development");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.stock.lock_timeout_secs, 5);
        assert!(!cfg.is_production());
    }
}
