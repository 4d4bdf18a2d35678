//! Error types for Carewatch

use thiserror::Error;

/// Errors that can occur during aggregation or geofence evaluation
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
