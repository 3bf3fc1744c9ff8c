//! Unified error type for the storefront.
//!
//! Core functions return [`Result`]; the HTTP layer maps each variant to a
//! status code in `http::error`.

use thiserror::Error;

/// Every failure the storefront can report.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable reason
        message: String,
    },

    /// A single input field failed validation
    #[error("Invalid {field}: {message}")]
    Validation {
        /// Name of the offending field as the client sent it
        field: String,
        /// Message shown next to the field
        message: String,
    },

    /// A looked-up row does not exist
    #[error("{entity} '{key}' not found")]
    NotFound {
        /// Entity name (e.g. "product")
        entity: &'static str,
        /// Identifier used for the lookup
        key: String,
    },

    /// The request conflicts with existing data (duplicates, dependents)
    #[error("Conflict: {message}")]
    Conflict {
        /// Human-readable reason
        message: String,
    },

    /// Not enough stock to satisfy a cart line or order line
    #[error("Insufficient stock for '{product}': {available} available, {requested} requested")]
    InsufficientStock {
        /// Product name
        product: String,
        /// Units currently in stock
        available: i64,
        /// Units requested
        requested: i64,
    },

    /// Money amount is negative, NaN or infinite
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// Order status change not permitted from the current status
    #[error("Cannot move order from '{from}' to '{to}'")]
    InvalidStatusTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// CSV file is malformed
    #[error("CSV error on line {line}: {message}")]
    Csv {
        /// 1-based line number (header is line 1)
        line: u64,
        /// Human-readable reason
        message: String,
    },

    /// Database error from `SeaORM`
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a [`Error::Validation`].
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::NotFound`].
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Shorthand for a [`Error::Conflict`].
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }
}

impl From<csv::Error> for Error {
    fn from(value: csv::Error) -> Self {
        let line = value.position().map_or(0, csv::Position::line);
        Self::Csv {
            line,
            message: value.to_string(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
