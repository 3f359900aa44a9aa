//! Wire DTOs for the Computation Service (camelCase JSON).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::Transaction;
use crate::portfolio::snapshot::{PortfolioSnapshot, Position};
use crate::portfolio::valuation::PriceType;

/// `{portfolio: {positions}}` envelope used by several operations.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PositionsEnvelope<'a> {
    pub positions: &'a [Position],
}

/// Request for `update_portfolio_transactions`.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ApplyTransactionsRequest<'a> {
    pub portfolio: PositionsEnvelope<'a>,
    pub transactions: &'a [Transaction],
}

/// Response of `update_portfolio_transactions`: the updated position set and
/// the cash delta of the applied transactions.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ApplyTransactionsResponse {
    pub positions: Vec<Position>,
    pub cash: Decimal,
}

/// Request for `update_portfolio_splits_dividends`.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AdjustSplitsDividendsRequest<'a> {
    pub portfolio: &'a PortfolioSnapshot,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// One adjusted interval returned by `update_portfolio_splits_dividends`.
/// Multiple fragments mean multiple corporate actions fell inside the
/// requested interval.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotFragment {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub positions: Vec<Position>,
    #[serde(default)]
    pub sub_positions: Vec<Position>,
}

/// Request for `update_portfolio_price`.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PricePositionsRequest<'a> {
    pub portfolio: PositionsEnvelope<'a>,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub price_type: PriceType,
}

/// Request for `update_portfolio_average_price`. Average cost is
/// path-dependent, so the full snapshot sequence goes over the wire.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AveragePriceRequest<'a> {
    pub portfolio_history: &'a [PortfolioSnapshot],
}

/// Response of price and average-price operations.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PositionsResponse {
    pub positions: Vec<Position>,
}

/// Request for `validate_transactions`.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTransactionsRequest {
    pub transactions: Vec<Transaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice_portfolio: Option<PortfolioSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investor_portfolio: Option<PortfolioSnapshot>,
}

/// Verdict of `validate_transactions`.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ValidationVerdict {
    pub valid: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Error body the oracle sends alongside a rejection status.
#[derive(Deserialize, Debug)]
pub(crate) struct OracleRejection {
    pub error: String,
}
