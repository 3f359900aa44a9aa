//! Client trait for the Computation Service.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{
    ApplyTransactionsResponse, SnapshotFragment, ValidateTransactionsRequest, ValidationVerdict,
};
use crate::errors::Result;
use crate::ledger::Transaction;
use crate::portfolio::snapshot::{PortfolioSnapshot, Position};
use crate::portfolio::valuation::PriceType;

/// One method per wire operation. The channel carries a single in-flight
/// call per request; implementations must be safe to share across tasks.
#[async_trait]
pub trait ComputeClientTrait: Send + Sync {
    /// `update_portfolio_transactions`: apply `transactions` to `positions`,
    /// returning the updated set and the cash delta. Rejects application
    /// that would violate position constraints (e.g. oversell where shorting
    /// is disallowed).
    async fn apply_transactions(
        &self,
        positions: &[Position],
        transactions: &[Transaction],
    ) -> Result<ApplyTransactionsResponse>;

    /// `update_portfolio_splits_dividends`: adjust the snapshot for
    /// corporate actions inside `[start_date, end_date]`. Returns zero or
    /// more interval fragments in ascending order.
    async fn adjust_splits_dividends(
        &self,
        snapshot: &PortfolioSnapshot,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<SnapshotFragment>>;

    /// `update_portfolio_price`: return the positions with `last_price` set
    /// for `date`. The list must not contain duplicate securities.
    async fn price_positions(
        &self,
        positions: &[Position],
        date: NaiveDate,
        price_type: PriceType,
    ) -> Result<Vec<Position>>;

    /// `update_portfolio_average_price`: reconstruct `avg_price` from the
    /// full snapshot sequence.
    async fn average_price(
        &self,
        portfolio_history: &[PortfolioSnapshot],
    ) -> Result<Vec<Position>>;

    /// `validate_transactions`: check a transaction set against advice and
    /// investor portfolios.
    async fn validate_transactions(
        &self,
        request: &ValidateTransactionsRequest,
    ) -> Result<ValidationVerdict>;
}
