//! Portfolio domain: snapshots, valuation and the orchestration service.

pub mod portfolio_service;
pub mod snapshot;
pub mod valuation;

pub use portfolio_service::*;
pub use snapshot::*;
pub use valuation::*;
