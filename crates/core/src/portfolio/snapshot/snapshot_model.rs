//! Portfolio snapshot domain models.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{far_future_date, inception_date, QUANTITY_THRESHOLD};
use crate::ledger::{Security, Transaction};

/// Returns true when a quantity is large enough to matter for aggregates.
pub fn is_quantity_significant(quantity: &Decimal) -> bool {
    let threshold =
        Decimal::from_str_radix(QUANTITY_THRESHOLD, 10).unwrap_or_else(|_| Decimal::new(1, 8));
    quantity.abs() >= threshold
}

/// A holding in one security. When `origin_advice` is set the entry is a
/// sub-position attributed to that advice; `None` marks directly-held stock.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub security: Security,
    /// May be negative (short) in notional/contest contexts.
    pub quantity: Decimal,
    /// Derived cost basis; only meaningful after average-price
    /// reconstruction.
    #[serde(default)]
    pub avg_price: Decimal,
    #[serde(default)]
    pub last_price: Decimal,
    #[serde(default)]
    pub total_fees: Decimal,
    #[serde(default)]
    pub dividend_cash: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_advice: Option<String>,
}

impl Position {
    pub fn new(security: Security) -> Self {
        Position {
            security,
            quantity: Decimal::ZERO,
            avg_price: Decimal::ZERO,
            last_price: Decimal::ZERO,
            total_fees: Decimal::ZERO,
            dividend_cash: Decimal::ZERO,
            origin_advice: None,
        }
    }

    pub fn for_advice(security: Security, origin_advice: Option<String>) -> Self {
        Position {
            origin_advice,
            ..Position::new(security)
        }
    }

    /// Market value at the stored last price.
    pub fn market_value(&self) -> Decimal {
        self.last_price * self.quantity
    }
}

/// Position and cash state of a portfolio over a contiguous date range.
///
/// Invariants: `positions` has at most one entry per security;
/// `sub_positions` is partitioned by `(origin_advice, security)` and its
/// per-security quantities sum to the matching aggregate entry. Both lists
/// are kept in canonical sort order so replay output is byte-deterministic.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    pub start_date: NaiveDate,
    /// Far-future sentinel while the snapshot is still open.
    pub end_date: NaiveDate,
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default)]
    pub sub_positions: Vec<Position>,
    #[serde(default)]
    pub cash: Decimal,
}

impl Default for PortfolioSnapshot {
    fn default() -> Self {
        PortfolioSnapshot {
            start_date: inception_date(),
            end_date: far_future_date(),
            positions: Vec::new(),
            sub_positions: Vec::new(),
            cash: Decimal::ZERO,
        }
    }
}

impl PortfolioSnapshot {
    /// The empty snapshot every portfolio starts from.
    pub fn inception() -> Self {
        PortfolioSnapshot::default()
    }

    /// True for the untouched inception snapshot (nothing ever applied).
    pub fn is_pristine(&self) -> bool {
        self.start_date == inception_date()
            && self.positions.is_empty()
            && self.sub_positions.is_empty()
            && self.cash.is_zero()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn position_for(&self, security: &Security) -> Option<&Position> {
        self.positions.iter().find(|p| &p.security == security)
    }

    /// Sub-positions belonging to one advice group (`None` is the
    /// directly-held bucket). Falls back to the aggregate list when no
    /// partition exists yet, so aggregate-only snapshots stay replayable.
    pub fn advice_group(&self, advice: Option<&str>) -> Vec<Position> {
        if self.sub_positions.is_empty() && !self.positions.is_empty() && advice.is_none() {
            return self.positions.clone();
        }
        self.sub_positions
            .iter()
            .filter(|p| p.origin_advice.as_deref() == advice)
            .cloned()
            .collect()
    }

    /// Rebuilds the aggregate `positions` list from `sub_positions`, summing
    /// per security. The aggregate average price is the quantity-weighted
    /// average of the sub-position cost bases; fees and dividend cash are
    /// summed.
    pub fn rebuild_aggregates(&mut self) {
        let mut aggregates: BTreeMap<Security, Position> = BTreeMap::new();
        let mut cost_sums: BTreeMap<Security, Decimal> = BTreeMap::new();

        for sub in &self.sub_positions {
            let entry = aggregates
                .entry(sub.security.clone())
                .or_insert_with(|| Position::new(sub.security.clone()));
            entry.quantity += sub.quantity;
            entry.total_fees += sub.total_fees;
            entry.dividend_cash += sub.dividend_cash;
            if !sub.last_price.is_zero() {
                entry.last_price = sub.last_price;
            }
            *cost_sums.entry(sub.security.clone()).or_default() += sub.avg_price * sub.quantity;
        }

        for (security, aggregate) in aggregates.iter_mut() {
            let cost = cost_sums.get(security).copied().unwrap_or_default();
            if aggregate.quantity > Decimal::ZERO && is_quantity_significant(&aggregate.quantity)
            {
                aggregate.avg_price = cost / aggregate.quantity;
            } else {
                aggregate.avg_price = Decimal::ZERO;
            }
        }

        self.positions = aggregates.into_values().collect();
    }

    /// Sorts both lists into canonical order (security key; advice key first
    /// for sub-positions) for deterministic output.
    pub fn normalize(&mut self) {
        self.positions.sort_by(|a, b| a.security.cmp(&b.security));
        self.sub_positions.sort_by(|a, b| {
            (&a.origin_advice, &a.security).cmp(&(&b.origin_advice, &b.security))
        });
    }
}

/// The persisted portfolio document: current snapshot, retired history and
/// the transaction ledger.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub id: String,
    /// Stored under the `detail` key in the document.
    #[serde(rename = "detail")]
    pub current: PortfolioSnapshot,
    #[serde(default)]
    pub history: Vec<PortfolioSnapshot>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<String>,
}

impl Portfolio {
    pub fn new(id: &str) -> Self {
        Portfolio {
            id: id.to_string(),
            current: PortfolioSnapshot::inception(),
            history: Vec::new(),
            transactions: Vec::new(),
            benchmark: None,
        }
    }

    /// Latest calendar date among non-deleted ledger entries.
    pub fn last_transaction_date(&self) -> Option<NaiveDate> {
        self.transactions
            .iter()
            .filter(|t| !t.deleted)
            .map(Transaction::trade_date)
            .max()
    }
}
