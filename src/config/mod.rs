use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable, for development
    #[default]
    Pretty,
    /// One JSON object per line, for production
    Json,
}

/// Tag store configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "tagstore")]
#[command(about = "Transactional store for tagged rule engine configurations")]
pub struct Config {
    /// HTTP server listen address
    #[arg(long, default_value = "127.0.0.1:8080", env = "TAGSTORE_LISTEN_ADDR")]
    pub listen_addr: String,

    /// PostgreSQL connection URL (in-memory datastore if not set)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Minimum pooled database connections
    #[arg(long, default_value = "1", env = "TAGSTORE_DB_MIN_CONNECTIONS")]
    pub db_min_connections: u32,

    /// Maximum pooled database connections
    #[arg(long, default_value = "10", env = "TAGSTORE_DB_MAX_CONNECTIONS")]
    pub db_max_connections: u32,

    /// Database connect timeout in seconds
    #[arg(long, default_value = "5", env = "TAGSTORE_DB_CONNECT_TIMEOUT_SECS")]
    pub db_connect_timeout_secs: u64,

    /// Apply embedded migrations at startup
    #[arg(
        long,
        default_value = "true",
        env = "TAGSTORE_RUN_MIGRATIONS",
        action = ArgAction::Set
    )]
    pub run_migrations: bool,

    /// Upper bound on a single store transaction in milliseconds
    #[arg(long, default_value = "5000", env = "TAGSTORE_TX_TIMEOUT_MS")]
    pub tx_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", env = "TAGSTORE_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Enable graceful shutdown
    #[arg(
        long,
        default_value = "true",
        env = "TAGSTORE_GRACEFUL_SHUTDOWN",
        action = ArgAction::Set
    )]
    pub graceful_shutdown: bool,

    /// Graceful shutdown timeout in seconds
    #[arg(long, default_value = "10", env = "TAGSTORE_SHUTDOWN_TIMEOUT_SECS")]
    pub shutdown_timeout_secs: u64,
}

impl Config {
    /// Get database connect timeout as Duration.
    pub fn db_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.db_connect_timeout_secs)
    }

    /// Get transaction timeout as Duration.
    pub fn tx_timeout(&self) -> Duration {
        Duration::from_millis(self.tx_timeout_ms)
    }

    /// Get shutdown timeout as Duration.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "127.0.0.1:8080".to_string(),
            database_url: None,
            db_min_connections: 1,
            db_max_connections: 10,
            db_connect_timeout_secs: 5,
            run_migrations: true,
            tx_timeout_ms: 5000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            graceful_shutdown: true,
            shutdown_timeout_secs: 10,
        }
    }
}
