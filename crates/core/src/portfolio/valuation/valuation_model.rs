//! Valuation domain models.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::portfolio::snapshot::Position;

/// Which price the oracle should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceType {
    /// Realtime.
    #[default]
    Rt,
    /// End of day.
    Eod,
}

/// Explicit per-operation valuation configuration (replaces loosely-typed
/// option bags).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValuationConfig {
    pub price_type: PriceType,
    /// Run path-dependent average-cost reconstruction before pricing.
    pub include_average_cost: bool,
    /// Leave cash out of net value (advice-only valuations, where cash is
    /// not part of the advisor's tracked universe).
    pub exclude_cash: bool,
}

/// A position annotated with market value, unrealized P&L and portfolio
/// weight.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PricedPosition {
    #[serde(flatten)]
    pub position: Position,
    pub market_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub weight_in_portfolio: Decimal,
}

/// A fully priced snapshot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PricedSnapshot {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub as_of: NaiveDate,
    pub positions: Vec<PricedPosition>,
    pub sub_positions: Vec<PricedPosition>,
    pub cash: Decimal,
    pub net_value: Decimal,
    pub cost: Decimal,
    pub total_pnl: Decimal,
    pub total_pnl_pct: Decimal,
}
