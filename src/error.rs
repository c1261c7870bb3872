//! Store Error Types
//!
//! Every failure surfaced by the query layer, the transaction coordinator
//! and the transfer workflow is a [`StoreError`]. Driver errors are
//! classified once, at conversion time, so callers can decide between
//! rejecting a request, retrying it, or giving up.

use std::time::Duration;
use thiserror::Error;

/// SQLSTATE codes the store treats as transient (safe to retry).
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";
const QUERY_CANCELED: &str = "57014";

/// SQLSTATE for a foreign-key violation (referenced row is missing).
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Store error types
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    // === Request Errors ===
    #[error("Source and destination accounts are the same: {0}")]
    SameAccount(i64),

    #[error("Amount must be greater than zero, got {0}")]
    InvalidAmount(i64),

    #[error("Insufficient funds in account {account_id} (balance would be {balance})")]
    InsufficientFunds { account_id: i64, balance: i64 },

    // === Record Errors ===
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Constraint violation ({code}): {message}")]
    Constraint { code: String, message: String },

    // === Store Errors ===
    #[error("Transient database error: {0}")]
    Transient(String),

    #[error("Transaction deadline of {0:?} exceeded")]
    Timeout(Duration),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Commit failed: {0}")]
    Commit(Box<StoreError>),

    #[error("tx error: {source}, rollback error: {rollback}")]
    Rollback {
        #[source]
        source: Box<StoreError>,
        rollback: String,
    },
}

impl StoreError {
    /// Get the stable error code for boundary responses
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::SameAccount(_) => "SAME_ACCOUNT",
            StoreError::InvalidAmount(_) => "INVALID_AMOUNT",
            StoreError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            StoreError::NotFound(_) => "NOT_FOUND",
            StoreError::Constraint { .. } => "CONSTRAINT_VIOLATION",
            StoreError::Transient(_) => "TRANSIENT",
            StoreError::Timeout(_) => "TIMEOUT",
            StoreError::Database(_) => "DATABASE_ERROR",
            StoreError::Commit(_) => "COMMIT_FAILED",
            StoreError::Rollback { .. } => "ROLLBACK_FAILED",
        }
    }

    /// Whether a caller may retry the whole operation with backoff.
    ///
    /// A failed rollback is never retryable: the connection state is unknown.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Transient(_) | StoreError::Timeout(_) => true,
            StoreError::Commit(inner) => inner.is_retryable(),
            _ => false,
        }
    }

    /// Whether the error means a referenced record does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::NotFound(_) => true,
            StoreError::Constraint { code, .. } => code == FOREIGN_KEY_VIOLATION,
            StoreError::Rollback { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// The error that started the failure chain (unwraps rollback/commit wrappers).
    pub fn root_cause(&self) -> &StoreError {
        match self {
            StoreError::Rollback { source, .. } => source.root_cause(),
            StoreError::Commit(inner) => inner.root_cause(),
            other => other,
        }
    }

    /// Re-label a generic not-found with the entity that was queried.
    pub(crate) fn for_entity(self, entity: &'static str) -> Self {
        match self {
            StoreError::NotFound(_) => StoreError::NotFound(entity),
            other => other,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound("record"),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
                classify_sqlstate(code, db_err.message().to_string())
            }
            e @ (sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_)) => StoreError::Transient(e.to_string()),
            other => StoreError::Database(other.to_string()),
        }
    }
}

fn classify_sqlstate(code: String, message: String) -> StoreError {
    match code.as_str() {
        SERIALIZATION_FAILURE | DEADLOCK_DETECTED | LOCK_NOT_AVAILABLE | QUERY_CANCELED => {
            StoreError::Transient(format!("{code}: {message}"))
        }
        c if c.starts_with("08") => StoreError::Transient(format!("{code}: {message}")),
        c if c.starts_with("23") => StoreError::Constraint { code, message },
        _ => StoreError::Database(format!("{code}: {message}")),
    }
}
