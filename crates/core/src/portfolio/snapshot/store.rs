//! Snapshot Store trait - the persistence boundary for portfolio documents.
//!
//! The engine reads a portfolio, reconstructs it fully in memory and writes
//! it back exactly once. Writes are compare-and-swap on a document version:
//! a mismatch is a [`crate::errors::Error::Conflict`] and the caller re-runs
//! the replay against the fresh base.

use async_trait::async_trait;

use super::Portfolio;
use crate::errors::Result;
use crate::ledger::Transaction;

/// A portfolio document together with its store version.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedPortfolio {
    pub portfolio: Portfolio,
    pub version: u64,
}

/// Atomic read/replace of a portfolio document by id.
#[async_trait]
pub trait PortfolioStoreTrait: Send + Sync {
    /// Fetch the full document.
    async fn fetch(&self, portfolio_id: &str) -> Result<VersionedPortfolio>;

    /// Replace current snapshot, history and ledger in one write. Fails with
    /// `Error::Conflict` when `expected_version` no longer matches. Returns
    /// the new version.
    async fn replace(
        &self,
        portfolio_id: &str,
        portfolio: &Portfolio,
        expected_version: u64,
    ) -> Result<u64>;

    /// Append ledger entries without touching snapshots. Same CAS contract
    /// as [`PortfolioStoreTrait::replace`].
    async fn append_transactions(
        &self,
        portfolio_id: &str,
        transactions: &[Transaction],
        expected_version: u64,
    ) -> Result<u64>;
}
