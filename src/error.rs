// ⚠️ Billing Errors - fail fast, no partial results
//
// Data errors abort the run, config errors are raised before it starts.
// Unknown companies are NOT errors (they price to zero, see pricing.rs).

use thiserror::Error;

/// Result type alias using BillingError
pub type Result<T> = std::result::Result<T, BillingError>;

#[derive(Debug, Error)]
pub enum BillingError {
    /// Malformed or missing required field in the source records
    #[error("Data error: {0}")]
    Data(String),

    /// Invalid configuration (month outside 1-12, bad tax rate, bad contract table)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record source failure
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BillingError {
    pub fn data(msg: impl Into<String>) -> Self {
        BillingError::Data(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        BillingError::Config(msg.into())
    }

    pub fn is_data_error(&self) -> bool {
        matches!(self, BillingError::Data(_))
    }

    pub fn is_config_error(&self) -> bool {
        matches!(self, BillingError::Config(_))
    }
}

impl From<serde_json::Error> for BillingError {
    fn from(err: serde_json::Error) -> Self {
        BillingError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for BillingError {
    fn from(err: csv::Error) -> Self {
        BillingError::Data(format!("CSV: {}", err))
    }
}
