//! Ledger domain models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identity of a traded security. Equality is structural over all four
/// fields; the tuple is also the aggregation key for positions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct Security {
    pub ticker: String,
    pub exchange: String,
    pub security_type: String,
    pub country: String,
}

impl Security {
    pub fn new(ticker: &str, exchange: &str, security_type: &str, country: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            exchange: exchange.to_string(),
            security_type: security_type.to_string(),
            country: country.to_string(),
        }
    }
}

impl std::fmt::Display for Security {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.ticker, self.exchange)
    }
}

/// A single ledger entry. Entries are append-only from the caller's
/// perspective: "delete" only sets the soft-delete flag so the ledger stays
/// the source of truth for full rebuilds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub security: Security,
    /// Positive for buys, negative for sells.
    pub quantity: Decimal,
    pub price: Decimal,
    pub transacted_at: DateTime<Utc>,
    /// Advice this transaction originated from, if any. Directly-held stock
    /// carries no origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_advice: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

impl Transaction {
    /// Calendar date of the transaction; time-of-day is ignored by batching.
    pub fn trade_date(&self) -> NaiveDate {
        self.transacted_at.date_naive()
    }
}

/// What the caller wants done with the incoming transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionAction {
    /// Append new transactions to the ledger.
    Add,
    /// Replace existing ledger entries, located by id.
    Update,
    /// Soft-delete existing ledger entries, located by id.
    Delete,
}

impl TransactionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionAction::Add => "ADD",
            TransactionAction::Update => "UPDATE",
            TransactionAction::Delete => "DELETE",
        }
    }
}
