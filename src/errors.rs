//! Unified error type for the ledger.
//!
//! Validation failures (`InvalidAmount`, `InsufficientBalance`, `Validation`, ...) are always
//! detected before any mutation, so a caller receiving one of them can assume nothing changed.

use rust_decimal::Decimal;
use sea_orm::DbErr;
use thiserror::Error;

/// All errors produced by the ledger, the accrual engine and the binary.
#[derive(Debug, Error)]
pub enum Error {
    /// A plan, investment, user or transaction does not exist (or is not usable).
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record that was looked up
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The amount lies outside the inclusive bounds allowed for the operation.
    #[error("Invalid amount: {amount} (must be between {min} and {max})")]
    InvalidAmount {
        /// Requested amount
        amount: Decimal,
        /// Inclusive lower bound
        min: Decimal,
        /// Inclusive upper bound
        max: Decimal,
    },

    /// The user does not have enough withdrawable balance.
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance {
        /// Withdrawable balance at the time of the check
        available: Decimal,
        /// Amount that was requested
        required: Decimal,
    },

    /// A transaction in a terminal status was targeted again.
    #[error("Transaction {id} already processed (status: {status})")]
    AlreadyProcessed {
        /// Transaction id
        id: String,
        /// Status the transaction is currently in
        status: String,
    },

    /// Malformed input.
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable reason
        message: String,
    },

    /// Configuration file or settings problem.
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable reason
        message: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Shorthand for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
