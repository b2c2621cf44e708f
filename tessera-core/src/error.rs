//! Error types for Tessera operations

use thiserror::Error;

/// Request resolution errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    /// Neither the request options nor the fetcher supplied a request key.
    #[error("No key was passed in and the fetcher has no name; the call is not cacheable")]
    MissingKey,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No capacity configuration available for request key '{request_key}'")]
    MissingRequestCapacity { request_key: String },

    #[error("No capacity configuration available for entity type '{entity_type}'")]
    MissingDataCapacity { entity_type: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Tier storage errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Cache tier lock poisoned")]
    LockPoisoned,
}

/// Master error type for all Tessera errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TesseraError {
    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for Tessera operations.
pub type TesseraResult<T> = Result<T, TesseraError>;

// =============================================================================
// TESTS
// =============================================================================
