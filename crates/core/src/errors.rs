//! Core error types for the reconstruction engine.
//!
//! The engine distinguishes caller mistakes (validation, unknown ids) from
//! collaborator failures (computation service, snapshot store) so that
//! mutation paths can fail whole while passive read paths degrade.

use chrono::NaiveDate;
use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Computation service call failed: {0}")]
    Oracle(#[from] OracleError),

    /// The computation service detected a state inconsistency (for example a
    /// sell exceeding the available quantity) while applying a batch. The
    /// whole batch is aborted; partial application per advice group would
    /// desynchronize positions from sub-positions.
    #[error("Consistency violation: {0}")]
    Consistency(String),

    /// Optimistic concurrency check failed on write. Callers re-run the
    /// replay against a fresh base before retrying.
    #[error("Concurrent modification of portfolio {portfolio_id}: expected version {expected}, found {actual}")]
    Conflict {
        portfolio_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Snapshot store operation failed: {0}")]
    Store(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Validation errors for transaction input. Rejected before any mutation.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Transaction {id} is dated {date}, which is later than tomorrow")]
    FutureDated { id: String, date: NaiveDate },

    #[error("Transaction {id} has zero quantity")]
    ZeroQuantity { id: String },

    #[error("Transaction {id} has a negative price")]
    NegativePrice { id: String },

    #[error("Transaction id {0} already exists in the ledger")]
    DuplicateId(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Failures of the external Computation Service.
#[derive(Error, Debug)]
pub enum OracleError {
    /// The service was unreachable or answered with a non-success status.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The service answered but rejected the request as invalid
    /// (oversells and other consistency violations arrive this way).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The service answered with a body the client could not interpret.
    #[error("malformed response: {0}")]
    Protocol(String),
}
