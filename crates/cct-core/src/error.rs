//! Error types for cloud-cost-tracker
//!
//! This module defines the error type shared by every crate in the workspace.
//! All errors are derived from `thiserror` for convenient error handling
//! and automatic `From` implementations.
//!
//! Errors fall into two groups. Record-level errors reject a single line item
//! and leave the rest of a batch untouched; everything else aborts the day
//! being processed. See [`CctError::is_record_level`].
//!
//! # Example
//!
//! ```
//! use cct_core::error::{CctError, Result};
//!
//! fn example_function() -> Result<()> {
//!     // This will automatically convert io::Error to CctError
//!     let _file = std::fs::read_to_string("nonexistent.txt")?;
//!     Ok(())
//! }
//! ```

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Main error type for cloud-cost-tracker operations
#[derive(Error, Debug)]
pub enum CctError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A remote API answered with a non-success status
    #[error("API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Identity string does not have the expected resource path shape
    #[error("Malformed identity: '{0}'")]
    MalformedIdentity(String),

    /// Interval whose start lies after its stop
    #[error("Invalid interval: start {start} is after stop {stop}")]
    InvalidInterval {
        /// Interval start
        start: DateTime<Utc>,
        /// Interval stop
        stop: DateTime<Utc>,
    },

    /// A single line item from a source could not be read
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A cost report as a whole could not be read
    #[error("Malformed cost report: {0}")]
    Report(String),

    /// No billing period covers the requested date
    #[error("No billing period found for {0}")]
    NoBillingPeriod(String),

    /// No cost report object covers the requested date
    #[error("No cost report found for {0}")]
    NoReport(String),

    /// Invalid date format
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Invalid timezone
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CctError {
    /// Whether the error only concerns one line item.
    ///
    /// Record-level errors are collected and reported while processing
    /// continues with the next record.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            Self::MalformedIdentity(_) | Self::InvalidInterval { .. } | Self::InvalidRecord(_)
        )
    }
}

/// Convenience type alias for Results in cloud-cost-tracker
pub type Result<T> = std::result::Result<T, CctError>;
