//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

/// Ten years.
const MAX_TOKEN_TTL_HOURS: i64 = 87_600;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub jwt_secret: String,
    /// Accepted for validation only, so tokens survive a secret rotation.
    pub jwt_previous_secret: Option<String>,
    pub token_ttl_hours: i64,
    pub cors_allowed_origin: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let db_max_connections = parse_or("DB_MAX_CONNECTIONS", lookup("DB_MAX_CONNECTIONS"), 5)?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Token Settings ---
        let jwt_secret = lookup("JWT_SECRET")
            .ok_or_else(|| ConfigError::MissingVar("JWT_SECRET".to_string()))?;
        if jwt_secret.is_empty() {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                "secret must be non-empty".to_string(),
            ));
        }
        let jwt_previous_secret = lookup("JWT_PREVIOUS_SECRET").filter(|s| !s.is_empty());

        let token_ttl_hours = parse_or("TOKEN_TTL_HOURS", lookup("TOKEN_TTL_HOURS"), 24)?;
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&token_ttl_hours) {
            return Err(ConfigError::InvalidValue(
                "TOKEN_TTL_HOURS".to_string(),
                format!("must be between 1 and {} hours", MAX_TOKEN_TTL_HOURS),
            ));
        }

        let cors_allowed_origin = lookup("CORS_ALLOWED_ORIGIN");

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            jwt_secret,
            jwt_previous_secret,
            token_ttl_hours,
            cors_allowed_origin,
        })
    }

    /// `memory://` selects the in-process store instead of PostgreSQL.
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with("memory://")
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_optional_vars_are_absent() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/books"),
            ("JWT_SECRET", "s3cret"),
        ]))
        .unwrap();

        assert_eq!(config.bind_address.port(), 8080);
        assert_eq!(config.token_ttl_hours, 24);
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.jwt_previous_secret.is_none());
        assert!(!config.uses_memory_store());
    }

    #[test]
    fn missing_secret_is_fatal() {
        let err = Config::from_lookup(lookup_from(&[("DATABASE_URL", "memory://")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(var) if var == "JWT_SECRET"));

        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "memory://"),
            ("JWT_SECRET", ""),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "JWT_SECRET"));
    }

    #[test]
    fn rejects_non_positive_ttl() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "memory://"),
            ("JWT_SECRET", "s3cret"),
            ("TOKEN_TTL_HOURS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "TOKEN_TTL_HOURS"));
    }

    #[test]
    fn rejects_ttl_beyond_ten_years() {
        let base = [("DATABASE_URL", "memory://"), ("JWT_SECRET", "s3cret")];

        let at_bound = Config::from_lookup(lookup_from(&[base[0], base[1], ("TOKEN_TTL_HOURS", "87600")]))
            .unwrap();
        assert_eq!(at_bound.token_ttl_hours, 87_600);

        let err = Config::from_lookup(lookup_from(&[
            base[0],
            base[1],
            ("TOKEN_TTL_HOURS", "10000000000"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "TOKEN_TTL_HOURS"));
    }

    #[test]
    fn memory_url_selects_memory_store() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "memory://"),
            ("JWT_SECRET", "s3cret"),
            ("JWT_PREVIOUS_SECRET", "old"),
        ]))
        .unwrap();
        assert!(config.uses_memory_store());
        assert_eq!(config.jwt_previous_secret.as_deref(), Some("old"));
    }
}
