//! Shared test doubles: a mock Computation Service with simple average-cost
//! arithmetic and an in-memory Snapshot Store with CAS semantics.

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::compute::{
    ApplyTransactionsResponse, ComputeClientTrait, SnapshotFragment, ValidateTransactionsRequest,
    ValidationVerdict,
};
use crate::errors::{Error, OracleError, Result};
use crate::ledger::{Security, Transaction};
use crate::portfolio::snapshot::{
    Portfolio, PortfolioSnapshot, PortfolioStoreTrait, Position, VersionedPortfolio,
};
use crate::portfolio::valuation::PriceType;

pub fn security(ticker: &str) -> Security {
    Security::new(ticker, "NSE", "EQ", "IN")
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn txn(
    id: &str,
    ticker: &str,
    quantity: Decimal,
    price: Decimal,
    date: NaiveDate,
    origin_advice: Option<&str>,
) -> Transaction {
    Transaction {
        id: id.to_string(),
        security: security(ticker),
        quantity,
        price,
        transacted_at: Utc
            .from_utc_datetime(&date.and_hms_opt(10, 30, 0).unwrap()),
        origin_advice: origin_advice.map(str::to_string),
        deleted: false,
    }
}

/// Mock oracle. Buys move the average cost, sells realize at the stored
/// average; shorting is rejected unless `allow_short` is set, mirroring the
/// real service's consistency check.
#[derive(Default)]
pub struct MockComputeClient {
    /// Latest price per security, served by `price_positions`.
    pub prices: RwLock<HashMap<Security, Decimal>>,
    /// Fragments returned by `adjust_splits_dividends`, keyed by the
    /// requested interval.
    pub fragments: RwLock<HashMap<(NaiveDate, NaiveDate), Vec<SnapshotFragment>>>,
    /// Average prices served by `average_price`.
    pub avg_prices: RwLock<HashMap<Security, Decimal>>,
    pub allow_short: bool,
    pub fail_pricing: AtomicBool,
    pub fail_average: AtomicBool,
    /// Counts `adjust_splits_dividends` calls, to assert sequencing.
    pub adjust_calls: AtomicUsize,
}

impl MockComputeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(self, ticker: &str, price: Decimal) -> Self {
        self.prices.write().unwrap().insert(security(ticker), price);
        self
    }

    pub fn add_fragments(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        fragments: Vec<SnapshotFragment>,
    ) {
        self.fragments
            .write()
            .unwrap()
            .insert((start, end), fragments);
    }
}

#[async_trait]
impl ComputeClientTrait for MockComputeClient {
    async fn apply_transactions(
        &self,
        positions: &[Position],
        transactions: &[Transaction],
    ) -> Result<ApplyTransactionsResponse> {
        let mut by_security: HashMap<Security, Position> = positions
            .iter()
            .map(|p| (p.security.clone(), p.clone()))
            .collect();
        let mut order: Vec<Security> = positions.iter().map(|p| p.security.clone()).collect();
        let mut cash = Decimal::ZERO;

        for txn in transactions {
            let position = by_security
                .entry(txn.security.clone())
                .or_insert_with(|| Position::new(txn.security.clone()));
            if !order.contains(&txn.security) {
                order.push(txn.security.clone());
            }
            if txn.quantity > Decimal::ZERO {
                let new_quantity = position.quantity + txn.quantity;
                position.avg_price = (position.quantity * position.avg_price
                    + txn.quantity * txn.price)
                    / new_quantity;
                position.quantity = new_quantity;
                cash -= txn.quantity * txn.price;
            } else {
                let sell_quantity = -txn.quantity;
                if !self.allow_short && sell_quantity > position.quantity {
                    return Err(Error::Oracle(OracleError::Rejected(format!(
                        "insufficient quantity to sell {} of {}",
                        sell_quantity, txn.security
                    ))));
                }
                position.quantity -= sell_quantity;
                cash += sell_quantity * txn.price;
            }
        }

        let updated = order
            .into_iter()
            .filter_map(|s| by_security.remove(&s))
            .filter(|p| !p.quantity.is_zero())
            .collect();
        Ok(ApplyTransactionsResponse {
            positions: updated,
            cash,
        })
    }

    async fn adjust_splits_dividends(
        &self,
        _snapshot: &PortfolioSnapshot,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<SnapshotFragment>> {
        self.adjust_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .fragments
            .read()
            .unwrap()
            .get(&(start_date, end_date))
            .cloned()
            .unwrap_or_default())
    }

    async fn price_positions(
        &self,
        positions: &[Position],
        _date: NaiveDate,
        _price_type: PriceType,
    ) -> Result<Vec<Position>> {
        if self.fail_pricing.load(Ordering::SeqCst) {
            return Err(Error::Oracle(OracleError::Transport(
                "pricing oracle unreachable".to_string(),
            )));
        }
        // The real oracle rejects duplicate securities in one request.
        for (i, a) in positions.iter().enumerate() {
            if positions[i + 1..].iter().any(|b| b.security == a.security) {
                return Err(Error::Oracle(OracleError::Rejected(format!(
                    "duplicate security {} in pricing request",
                    a.security
                ))));
            }
        }
        let prices = self.prices.read().unwrap();
        Ok(positions
            .iter()
            .cloned()
            .map(|mut p| {
                if let Some(price) = prices.get(&p.security) {
                    p.last_price = *price;
                }
                p
            })
            .collect())
    }

    async fn average_price(
        &self,
        portfolio_history: &[PortfolioSnapshot],
    ) -> Result<Vec<Position>> {
        if self.fail_average.load(Ordering::SeqCst) {
            return Err(Error::Oracle(OracleError::Transport(
                "average-price oracle unreachable".to_string(),
            )));
        }
        let avg_prices = self.avg_prices.read().unwrap();
        let last = portfolio_history
            .last()
            .ok_or_else(|| Error::Oracle(OracleError::Rejected("empty history".to_string())))?;
        Ok(last
            .positions
            .iter()
            .cloned()
            .map(|mut p| {
                if let Some(avg) = avg_prices.get(&p.security) {
                    p.avg_price = *avg;
                }
                p
            })
            .collect())
    }

    async fn validate_transactions(
        &self,
        _request: &ValidateTransactionsRequest,
    ) -> Result<ValidationVerdict> {
        Ok(ValidationVerdict {
            valid: true,
            reason: None,
        })
    }
}

/// In-memory Snapshot Store with compare-and-swap versioning.
#[derive(Default)]
pub struct InMemoryPortfolioStore {
    documents: RwLock<HashMap<String, (Portfolio, u64)>>,
    /// Number of upcoming `replace` calls to fail with a conflict, for
    /// exercising the retry path.
    pub conflicts_to_inject: AtomicUsize,
}

impl InMemoryPortfolioStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, portfolio: Portfolio) {
        self.documents
            .write()
            .unwrap()
            .insert(portfolio.id.clone(), (portfolio, 1));
    }

    pub fn version_of(&self, portfolio_id: &str) -> Option<u64> {
        self.documents
            .read()
            .unwrap()
            .get(portfolio_id)
            .map(|(_, v)| *v)
    }
}

#[async_trait]
impl PortfolioStoreTrait for InMemoryPortfolioStore {
    async fn fetch(&self, portfolio_id: &str) -> Result<VersionedPortfolio> {
        self.documents
            .read()
            .unwrap()
            .get(portfolio_id)
            .map(|(portfolio, version)| VersionedPortfolio {
                portfolio: portfolio.clone(),
                version: *version,
            })
            .ok_or_else(|| Error::NotFound(format!("Portfolio {} not found", portfolio_id)))
    }

    async fn replace(
        &self,
        portfolio_id: &str,
        portfolio: &Portfolio,
        expected_version: u64,
    ) -> Result<u64> {
        if self.conflicts_to_inject.load(Ordering::SeqCst) > 0 {
            self.conflicts_to_inject.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::Conflict {
                portfolio_id: portfolio_id.to_string(),
                expected: expected_version,
                actual: expected_version + 1,
            });
        }
        let mut documents = self.documents.write().unwrap();
        let entry = documents
            .get_mut(portfolio_id)
            .ok_or_else(|| Error::NotFound(format!("Portfolio {} not found", portfolio_id)))?;
        if entry.1 != expected_version {
            return Err(Error::Conflict {
                portfolio_id: portfolio_id.to_string(),
                expected: expected_version,
                actual: entry.1,
            });
        }
        entry.0 = portfolio.clone();
        entry.1 += 1;
        Ok(entry.1)
    }

    async fn append_transactions(
        &self,
        portfolio_id: &str,
        transactions: &[Transaction],
        expected_version: u64,
    ) -> Result<u64> {
        let mut documents = self.documents.write().unwrap();
        let entry = documents
            .get_mut(portfolio_id)
            .ok_or_else(|| Error::NotFound(format!("Portfolio {} not found", portfolio_id)))?;
        if entry.1 != expected_version {
            return Err(Error::Conflict {
                portfolio_id: portfolio_id.to_string(),
                expected: expected_version,
                actual: entry.1,
            });
        }
        entry.0.transactions.extend(transactions.iter().cloned());
        entry.1 += 1;
        Ok(entry.1)
    }
}
