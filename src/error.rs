/// Centralized error types for the data loader
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

use crate::types::Field;

/// Why a series was rejected by the validator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationFailure {
    #[error("series is empty")]
    Empty,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("missing {field} value at bar {index}")]
    MissingValue { index: usize, field: Field },

    #[error("negative {field} value {value} at bar {index}")]
    NegativeValue { index: usize, field: Field, value: f64 },

    #[error("duplicate timestamp {0}")]
    DuplicateTimestamp(DateTime<Utc>),

    #[error("timestamp {current} does not follow {previous}")]
    Unordered {
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("non-numeric {field} value at bar {index}")]
    NonNumeric { index: usize, field: Field },

    #[error("timestamp {timestamp} outside [{start}, {end})")]
    OutOfRange {
        timestamp: DateTime<Utc>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("{0}")]
    Malformed(String),
}

/// Cache read/write failures. Never conflated with "not cached".
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cache codec failed for {path}: {source}")]
    Codec {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("corrupt cache entry {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("cache entry {path} belongs to {found}, expected {expected}")]
    KeyMismatch {
        path: String,
        expected: String,
        found: String,
    },
}

#[derive(Error, Debug)]
pub enum DataLoaderError {
    // Provider Errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    // Data Errors
    #[error("Data validation failed for {symbol}: {reason}")]
    DataValidation {
        symbol: String,
        reason: ValidationFailure,
    },

    // Cache Errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    // Batch Errors
    #[error("No symbols configured")]
    NoSymbolsConfigured,

    #[error("No valid data loaded for any of {requested} symbols")]
    NoValidData { requested: usize },

    // Task Errors
    #[error("Acquisition timed out for {symbol} after {}ms", .limit.as_millis())]
    Timeout { symbol: String, limit: Duration },

    #[error("Acquisition task for {symbol} failed: {message}")]
    TaskFailed { symbol: String, message: String },

    // Configuration Errors
    #[error("Configuration error: {0}")]
    Config(String),

    // File I/O Errors
    #[error("File I/O error: {0}")]
    File(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DataLoaderError>;

impl DataLoaderError {
    pub fn validation(symbol: &str, reason: ValidationFailure) -> Self {
        DataLoaderError::DataValidation {
            symbol: symbol.to_string(),
            reason,
        }
    }

    /// Transport-level faults; a later run may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DataLoaderError::Network(_)
                | DataLoaderError::Http(_)
                | DataLoaderError::Timeout { .. }
                | DataLoaderError::Cache(_)
        )
    }

    /// True for errors raised by the provider boundary
    pub fn is_network(&self) -> bool {
        matches!(self, DataLoaderError::Network(_) | DataLoaderError::Http(_))
    }

    /// Get error code for logging/monitoring
    pub fn error_code(&self) -> &str {
        match self {
            DataLoaderError::Network(_) => "NET_001",
            DataLoaderError::Http(_) => "NET_002",
            DataLoaderError::DataValidation { .. } => "DATA_001",
            DataLoaderError::Cache(_) => "CACHE_001",
            DataLoaderError::NoSymbolsConfigured => "BATCH_001",
            DataLoaderError::NoValidData { .. } => "BATCH_002",
            DataLoaderError::Timeout { .. } => "TASK_001",
            DataLoaderError::TaskFailed { .. } => "TASK_002",
            DataLoaderError::Config(_) => "CFG_001",
            DataLoaderError::File(_) => "FILE_001",
            DataLoaderError::Serialization(_) => "SER_001",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let net = DataLoaderError::Network("connection reset".to_string());
        assert!(net.is_network());
        assert!(net.is_recoverable());
        assert_eq!(net.error_code(), "NET_001");

        let invalid = DataLoaderError::validation("BTCUSDT", ValidationFailure::Empty);
        assert!(!invalid.is_network());
        assert!(!invalid.is_recoverable());
        assert_eq!(
            invalid.to_string(),
            "Data validation failed for BTCUSDT: series is empty"
        );

        let timeout = DataLoaderError::Timeout {
            symbol: "ETHBTC".to_string(),
            limit: Duration::from_millis(250),
        };
        assert_eq!(timeout.to_string(), "Acquisition timed out for ETHBTC after 250ms");
        assert_eq!(timeout.error_code(), "TASK_001");

        let none = DataLoaderError::NoValidData { requested: 3 };
        assert_eq!(none.error_code(), "BATCH_002");
    }

    #[test]
    fn test_cache_error_wraps() {
        let err: DataLoaderError = CacheError::Corrupt {
            path: "x.json.gz".to_string(),
            reason: "digest mismatch".to_string(),
        }
        .into();
        assert_eq!(err.error_code(), "CACHE_001");
    }
}
