//! Computation Service client.
//!
//! The engine treats the Computation Service as a stateless oracle: it owns
//! all pricing, corporate-action and transaction-arithmetic numerics, while
//! the engine only sequences, batches and reconciles the calls.

mod compute_model;
mod compute_traits;
mod http_client;

pub use compute_model::*;
pub use compute_traits::*;
pub use http_client::*;
