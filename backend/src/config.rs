//! Configuration management for the Coffee Ledger API
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with LEDGER__ prefix

use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::Collection;
use validator::{Validate, ValidationError};

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    pub server: ServerConfig,

    /// Where the ledger is read from
    pub ledger: LedgerConfig,

    /// PostgreSQL settings, used when `ledger.source = "postgres"`
    pub database: DatabaseConfig,

    /// Spreadsheet settings, used when `ledger.source = "sheets"`
    pub sheets: SheetsConfig,

    pub engine: EngineConfig,

    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LedgerSource {
    Memory,
    Postgres,
    Sheets,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    pub source: LedgerSource,

    /// JSON file loaded into the in-memory store at startup
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SheetsConfig {
    /// Export endpoint, without the spreadsheet id
    pub base_url: String,

    pub spreadsheet_id: String,

    pub request_timeout_secs: u64,

    /// Sheet name per collection
    #[serde(default)]
    pub tabs: SheetTabs,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SheetTabs {
    pub purchases: String,
    pub warehouse_entries: String,
    pub processes: String,
    pub sales: String,
    pub expenses: String,
}

impl Default for SheetTabs {
    fn default() -> Self {
        Self {
            purchases: Collection::Purchases.sheet_name().to_string(),
            warehouse_entries: Collection::WarehouseEntries.sheet_name().to_string(),
            processes: Collection::Processes.sheet_name().to_string(),
            sales: Collection::Sales.sheet_name().to_string(),
            expenses: Collection::Expenses.sheet_name().to_string(),
        }
    }
}

impl SheetTabs {
    pub fn name_for(&self, collection: Collection) -> &str {
        match collection {
            Collection::Purchases => &self.purchases,
            Collection::WarehouseEntries => &self.warehouse_entries,
            Collection::Processes => &self.processes,
            Collection::Sales => &self.sales,
            Collection::Expenses => &self.expenses,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct EngineConfig {
    /// Upper bound for one query, snapshot included
    #[validate(range(min = 1, max = 600000))]
    pub query_timeout_ms: u64,

    /// Process count from which evaluation is split across the blocking pool
    #[validate(range(min = 1))]
    pub parallel_threshold: usize,

    /// Processes per blocking task when evaluating in parallel
    #[validate(range(min = 1))]
    pub chunk_size: usize,

    /// IANA zone in which "today" is evaluated for default windows
    #[validate(custom = "validate_timezone")]
    pub timezone: String,
}

impl EngineConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Parsed business timezone; falls back to UTC if the name is unknown
    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(Tz::UTC)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: 10_000,
            parallel_threshold: 64,
            chunk_size: 32,
            timezone: "America/Lima".to_string(),
        }
    }
}

fn validate_timezone(name: &str) -> Result<(), ValidationError> {
    name.parse::<Tz>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("unknown_timezone"))
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("LEDGER_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 5000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("ledger.source", "memory")?
            .set_default("database.url", "postgres://localhost/coffee_ledger")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("sheets.base_url", "https://docs.google.com/spreadsheets/d")?
            .set_default("sheets.spreadsheet_id", "")?
            .set_default("sheets.request_timeout_secs", 15)?
            .set_default("engine.query_timeout_ms", 10_000)?
            .set_default("engine.parallel_threshold", 64)?
            .set_default("engine.chunk_size", 32)?
            .set_default("engine.timezone", "America/Lima")?
            .set_default("logging.format", "text")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (LEDGER__ prefix)
            .add_source(
                Environment::with_prefix("LEDGER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.check()?;
        Ok(config)
    }

    /// Reject settings the server cannot run with
    pub fn check(&self) -> Result<(), ConfigError> {
        self.engine
            .validate()
            .map_err(|e| ConfigError::Message(format!("invalid engine settings: {}", e)))?;
        if self.ledger.source == LedgerSource::Sheets && self.sheets.spreadsheet_id.is_empty() {
            return Err(ConfigError::Message(
                "sheets.spreadsheet_id is required when ledger.source = \"sheets\"".to_string(),
            ));
        }
        Ok(())
    }
}
