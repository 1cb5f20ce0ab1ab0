//! Error types for the analytics service

use thiserror::Error;

/// Relational store errors
///
/// Connection acquisition and statement execution are kept apart so the HTTP
/// layer can report them separately.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Could not obtain a connection from the pool
    #[error("Não foi possível conectar ao banco de dados: {0}")]
    Unavailable(String),

    /// Statement failed during execution or row decoding
    #[error("{0}")]
    Query(String),
}

impl StoreError {
    /// Wrap a connection-level failure
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        StoreError::Unavailable(err.to_string())
    }

    /// Wrap an execution-level failure
    pub fn query(err: impl std::fmt::Display) -> Self {
        StoreError::Query(err.to_string())
    }
}

/// Cache backend errors
///
/// None of these ever reach a client. The cache-aside layer reads every
/// variant as a miss.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backend cannot be reached (connection refused, disabled, not configured)
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// Backend reached but the command failed
    #[error("Cache command failed: {0}")]
    Command(String),

    /// Command did not complete within the configured timeout
    #[error("Cache operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// Path that was being read
        path: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for the expected schema
    #[error("Failed to parse config file {path}: {message}")]
    Parse {
        /// Path that was being parsed
        path: String,
        /// Parser message
        message: String,
    },

    /// Environment variable holds an unusable value
    #[error("Invalid value for {var}: {value}")]
    InvalidEnv {
        /// Variable name
        var: String,
        /// Offending value
        value: String,
    },

    /// A setting failed validation
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
