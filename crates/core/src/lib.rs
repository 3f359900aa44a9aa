//! Modelfolio Core - Portfolio Transaction Ledger & Temporal Reconstruction
//! Engine.
//!
//! Turns an append-only stream of buy/sell transactions (possibly
//! out-of-order, edited or soft-deleted) plus periodic corporate actions
//! into a correct, date-indexed sequence of portfolio snapshots. Pricing,
//! adjustment and transaction arithmetic live in an external Computation
//! Service; persistence lives behind the Snapshot Store trait. This crate
//! only sequences, batches and reconciles.

pub mod compute;
pub mod constants;
pub mod errors;
pub mod ledger;
pub mod portfolio;

// Re-export common types
pub use ledger::*;
pub use portfolio::*;

// Re-export error types
pub use errors::Error;
pub use errors::Result;

#[cfg(test)]
pub(crate) mod test_support;
