//! Valuation module - pricing, P&L and weights.

pub mod valuation_calculator;
mod valuation_model;
mod valuation_service;

pub use valuation_calculator::calculate_valuation;
pub use valuation_model::*;
pub use valuation_service::*;
