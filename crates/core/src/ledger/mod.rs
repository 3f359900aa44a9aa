//! Transaction ledger - append-only record of buys and sells plus the
//! batching logic that turns it into replayable date batches.

pub mod batcher;
mod ledger_model;

pub use batcher::*;
pub use ledger_model::*;
