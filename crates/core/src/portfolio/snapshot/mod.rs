//! Portfolio snapshot module - models, temporal reconstruction and
//! point-in-time reads.

pub mod reader;
mod replay;
mod snapshot_model;
mod store;

pub use reader::*;
pub use replay::*;
pub use snapshot_model::*;
pub use store::*;
