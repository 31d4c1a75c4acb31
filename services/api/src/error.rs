//! services/api/src/error.rs
//!
//! Startup and fatal errors of the `api` binary. Request-level failures never
//! come through here; handlers answer them with a status code directly.

use crate::config::ConfigError;
use crate::token::TokenError;

/// Anything reaching `main` through this type stops the process.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pool creation or connection failure.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// The signing key could not be set up.
    #[error("Token Error: {0}")]
    Token(#[from] TokenError),

    /// Binding the listener or serving failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
