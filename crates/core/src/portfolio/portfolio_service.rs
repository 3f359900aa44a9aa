//! Portfolio orchestration service - the engine's produced interfaces.
//!
//! Every mutation is fetch -> batch -> replay -> single atomic write; the
//! replay holds no persisted side effects, so a failed or slow oracle call
//! never leaves partial state behind. Writes are compare-and-swap and a
//! conflicting writer re-runs the replay against the fresh base.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use log::{debug, warn};
use std::sync::Arc;

use crate::compute::{ComputeClientTrait, ValidateTransactionsRequest, ValidationVerdict};
use crate::constants::MAX_WRITE_ATTEMPTS;
use crate::errors::{Error, Result};
use crate::ledger::{batcher, ReplayMode, Transaction, TransactionAction};
use crate::portfolio::snapshot::{
    reader, Portfolio, PortfolioSnapshot, PortfolioStoreTrait, ReplayEngine, SnapshotResolution,
};
use crate::portfolio::valuation::{PricedSnapshot, ValuationConfig, ValuationServiceTrait};

/// Options for a transaction-affecting call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionUpdateOptions {
    /// Run the full replay but persist nothing. Preview output is
    /// bit-identical to the non-preview replay of the same inputs.
    pub preview: bool,
    pub valuation: ValuationConfig,
}

#[async_trait]
pub trait PortfolioServiceTrait: Send + Sync {
    /// Applies `incoming` to the portfolio's ledger per `action`, replays
    /// the affected timeline and persists the result atomically (unless
    /// previewing). Returns the newly priced current snapshot.
    async fn update_portfolio_for_stock_transactions(
        &self,
        portfolio_id: &str,
        incoming: Vec<Transaction>,
        action: TransactionAction,
        options: &TransactionUpdateOptions,
    ) -> Result<PricedSnapshot>;

    /// Point-in-time read: the priced snapshot covering `date`.
    async fn get_portfolio_for_date(
        &self,
        portfolio_id: &str,
        date: NaiveDate,
        config: &ValuationConfig,
    ) -> Result<PricedSnapshot>;

    /// Raw snapshot history overlapping the range, current included when the
    /// range reaches it.
    async fn get_portfolio_history(
        &self,
        portfolio_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PortfolioSnapshot>>;

    /// Passive re-pricing of the current snapshot.
    async fn compute_updated_portfolio_for_price(
        &self,
        portfolio_id: &str,
        config: &ValuationConfig,
    ) -> Result<PricedSnapshot>;

    /// Prices the snapshot covering `as_of` with oracle-reconstructed
    /// average cost; degrades to a plain valuation when reconstruction
    /// fails.
    async fn with_average_price(
        &self,
        portfolio_id: &str,
        as_of: NaiveDate,
        config: &ValuationConfig,
    ) -> Result<PricedSnapshot>;

    /// Oracle passthrough for transaction validation.
    async fn validate_transactions(
        &self,
        request: &ValidateTransactionsRequest,
    ) -> Result<ValidationVerdict>;
}

#[derive(Clone)]
pub struct PortfolioService {
    store: Arc<dyn PortfolioStoreTrait>,
    compute: Arc<dyn ComputeClientTrait>,
    valuation: Arc<dyn ValuationServiceTrait>,
    replay_engine: ReplayEngine,
}

impl PortfolioService {
    pub fn new(
        store: Arc<dyn PortfolioStoreTrait>,
        compute: Arc<dyn ComputeClientTrait>,
        valuation: Arc<dyn ValuationServiceTrait>,
    ) -> Self {
        let replay_engine = ReplayEngine::new(Arc::clone(&compute));
        Self {
            store,
            compute,
            valuation,
            replay_engine,
        }
    }

    /// Reconstructs average cost for the snapshot covering `as_of` by
    /// submitting the full preceding snapshot sequence to the oracle.
    /// Returns `None` (logged) when the oracle call fails.
    async fn reconstruct_average_cost(
        &self,
        portfolio: &Portfolio,
        as_of: NaiveDate,
    ) -> Option<PortfolioSnapshot> {
        let lookup = reader::snapshot_at(portfolio, as_of);
        let mut sequence: Vec<PortfolioSnapshot> = portfolio
            .history
            .iter()
            .filter(|s| s.start_date <= as_of)
            .cloned()
            .collect();
        if lookup.resolution != SnapshotResolution::Historical {
            sequence.push(portfolio.current.clone());
        }

        match self.compute.average_price(&sequence).await {
            Ok(reconstructed) => {
                let mut snapshot = lookup.snapshot;
                for position in snapshot.positions.iter_mut() {
                    if let Some(avg) = reconstructed
                        .iter()
                        .find(|p| p.security == position.security)
                    {
                        position.avg_price = avg.avg_price;
                    }
                }
                Some(snapshot)
            }
            Err(e) => {
                warn!(
                    "Average-cost reconstruction failed for portfolio {}: {}. Valuating without it.",
                    portfolio.id, e
                );
                None
            }
        }
    }
}

#[async_trait]
impl PortfolioServiceTrait for PortfolioService {
    async fn update_portfolio_for_stock_transactions(
        &self,
        portfolio_id: &str,
        incoming: Vec<Transaction>,
        action: TransactionAction,
        options: &TransactionUpdateOptions,
    ) -> Result<PricedSnapshot> {
        let now = Utc::now();
        let today = now.date_naive();

        let mut last_conflict: Option<Error> = None;
        for attempt in 0..MAX_WRITE_ATTEMPTS {
            let versioned = self.store.fetch(portfolio_id).await?;
            let mut portfolio = versioned.portfolio;

            let plan = batcher::plan(
                &portfolio.transactions,
                incoming.clone(),
                action,
                portfolio.current.start_date,
                now,
            )?;

            let start = match plan.mode {
                ReplayMode::Append => portfolio.current.clone(),
                ReplayMode::Create => PortfolioSnapshot::inception(),
            };
            let outcome = self.replay_engine.replay(start, &plan.batches, today).await?;

            if options.preview {
                return self
                    .valuation
                    .valuate(&outcome.current, &options.valuation, today)
                    .await;
            }

            portfolio.transactions = plan.ledger;
            match plan.mode {
                ReplayMode::Append => portfolio.history.extend(outcome.history_append),
                ReplayMode::Create => portfolio.history = outcome.history_append,
            }
            portfolio.current = outcome.current;

            match self
                .store
                .replace(portfolio_id, &portfolio, versioned.version)
                .await
            {
                Ok(new_version) => {
                    debug!(
                        "Persisted portfolio {} at version {} ({} history entries)",
                        portfolio_id,
                        new_version,
                        portfolio.history.len()
                    );
                    return self
                        .valuation
                        .valuate(&portfolio.current, &options.valuation, today)
                        .await;
                }
                Err(conflict @ Error::Conflict { .. }) => {
                    warn!(
                        "Write conflict on portfolio {} (attempt {}); re-running replay",
                        portfolio_id,
                        attempt + 1
                    );
                    last_conflict = Some(conflict);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_conflict
            .unwrap_or_else(|| Error::Unexpected("write retry loop exhausted".to_string())))
    }

    async fn get_portfolio_for_date(
        &self,
        portfolio_id: &str,
        date: NaiveDate,
        config: &ValuationConfig,
    ) -> Result<PricedSnapshot> {
        let versioned = self.store.fetch(portfolio_id).await?;
        let portfolio = versioned.portfolio;

        let snapshot = if config.include_average_cost {
            self.reconstruct_average_cost(&portfolio, date).await
        } else {
            None
        };
        let snapshot = snapshot.unwrap_or_else(|| reader::snapshot_at(&portfolio, date).snapshot);

        Ok(self.valuation.valuate_or_last(&snapshot, config, date).await)
    }

    async fn get_portfolio_history(
        &self,
        portfolio_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PortfolioSnapshot>> {
        let versioned = self.store.fetch(portfolio_id).await?;
        Ok(reader::history_between(&versioned.portfolio, start, end))
    }

    async fn compute_updated_portfolio_for_price(
        &self,
        portfolio_id: &str,
        config: &ValuationConfig,
    ) -> Result<PricedSnapshot> {
        let versioned = self.store.fetch(portfolio_id).await?;
        let today = Utc::now().date_naive();
        Ok(self
            .valuation
            .valuate_or_last(&versioned.portfolio.current, config, today)
            .await)
    }

    async fn with_average_price(
        &self,
        portfolio_id: &str,
        as_of: NaiveDate,
        config: &ValuationConfig,
    ) -> Result<PricedSnapshot> {
        let versioned = self.store.fetch(portfolio_id).await?;
        let portfolio = versioned.portfolio;

        let snapshot = self
            .reconstruct_average_cost(&portfolio, as_of)
            .await
            .unwrap_or_else(|| reader::snapshot_at(&portfolio, as_of).snapshot);

        Ok(self.valuation.valuate_or_last(&snapshot, config, as_of).await)
    }

    async fn validate_transactions(
        &self,
        request: &ValidateTransactionsRequest,
    ) -> Result<ValidationVerdict> {
        self.compute.validate_transactions(request).await
    }
}
