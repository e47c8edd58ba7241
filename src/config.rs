//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;

use rust_decimal::Decimal;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL (SQLite)
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Lifetime of a login session in hours
    pub session_ttl_hours: i64,

    /// Upper bound for a single transfer
    pub max_transfer_amount: Decimal,

    /// Populate demo accounts on first run
    pub seed_demo_data: bool,

    /// Allowed CORS origin for the browser client
    pub cors_origin: String,

    /// Emit JSON logs instead of human readable text
    pub log_json: bool,

    /// Argon2 memory cost in KiB
    pub password_hash_memory_kib: u32,

    /// Argon2 iteration count
    pub password_hash_iterations: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://bank.db?mode=rwc".to_string(),
            database_max_connections: 5,
            host: "127.0.0.1".to_string(),
            port: 5000,
            environment: "development".to_string(),
            session_ttl_hours: 24,
            max_transfer_amount: Decimal::new(1_000_000, 0),
            seed_demo_data: true,
            cors_origin: "http://localhost:3000".to_string(),
            log_json: false,
            password_hash_memory_kib: argon2::Params::DEFAULT_M_COST,
            password_hash_iterations: argon2::Params::DEFAULT_T_COST,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let database_url = env::var("DATABASE_URL").unwrap_or(defaults.database_url);
        let database_max_connections = parse_var(
            "DATABASE_MAX_CONNECTIONS",
            defaults.database_max_connections,
        )?;
        let host = env::var("HOST").unwrap_or(defaults.host);
        let port = parse_var("PORT", defaults.port)?;
        let environment = env::var("ENVIRONMENT").unwrap_or(defaults.environment);

        let session_ttl_hours: i64 = parse_var("SESSION_TTL_HOURS", defaults.session_ttl_hours)?;
        if session_ttl_hours <= 0 {
            return Err(ConfigError::InvalidValue("SESSION_TTL_HOURS"));
        }

        let max_transfer_amount: Decimal =
            parse_var("MAX_TRANSFER_AMOUNT", defaults.max_transfer_amount)?;
        if max_transfer_amount <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue("MAX_TRANSFER_AMOUNT"));
        }

        let seed_demo_data = parse_var("SEED_DEMO_DATA", defaults.seed_demo_data)?;
        let cors_origin = env::var("CORS_ORIGIN").unwrap_or(defaults.cors_origin);

        let log_json = match env::var("LOG_FORMAT") {
            Ok(format) if format.eq_ignore_ascii_case("json") => true,
            Ok(format) if format.eq_ignore_ascii_case("text") => false,
            Ok(_) => return Err(ConfigError::InvalidValue("LOG_FORMAT")),
            Err(_) => defaults.log_json,
        };

        let password_hash_memory_kib = parse_var(
            "PASSWORD_HASH_MEMORY_KIB",
            defaults.password_hash_memory_kib,
        )?;
        let password_hash_iterations = parse_var(
            "PASSWORD_HASH_ITERATIONS",
            defaults.password_hash_iterations,
        )?;

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            session_ttl_hours,
            max_transfer_amount,
            seed_demo_data,
            cors_origin,
            log_json,
            password_hash_memory_kib,
            password_hash_iterations,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Read an optional variable, falling back to `default` when unset.
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
