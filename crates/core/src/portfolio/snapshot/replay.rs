//! Replay Engine.
//!
//! Deterministically folds date-ordered transaction batches over a starting
//! snapshot, producing the new current snapshot and the history entries
//! retired along the way. All arithmetic (corporate-action adjustment,
//! transaction application) is delegated to the Computation Service; the
//! engine only sequences the calls and keeps the aggregate/sub-position
//! partition consistent.
//!
//! The fold is pure given its inputs: `today` is a parameter, never the wall
//! clock, and nothing is persisted here.

use chrono::{Days, NaiveDate};
use futures::future::try_join_all;
use log::{debug, warn};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::compute::{ComputeClientTrait, SnapshotFragment};
use crate::constants::far_future_date;
use crate::errors::{Error, OracleError, Result};
use crate::ledger::{DateBatch, Transaction};
use crate::portfolio::snapshot::{PortfolioSnapshot, Position};

/// Result of a replay: the new open snapshot plus the history entries to
/// append (or, for a full rebuild, the entire new history).
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome {
    pub current: PortfolioSnapshot,
    pub history_append: Vec<PortfolioSnapshot>,
}

#[derive(Clone)]
pub struct ReplayEngine {
    compute: Arc<dyn ComputeClientTrait>,
}

impl ReplayEngine {
    pub fn new(compute: Arc<dyn ComputeClientTrait>) -> Self {
        Self { compute }
    }

    /// Folds `batches` (strictly ascending dates) over `start`, then adjusts
    /// the final working snapshot forward through `today`.
    pub async fn replay(
        &self,
        start: PortfolioSnapshot,
        batches: &[DateBatch],
        today: NaiveDate,
    ) -> Result<ReplayOutcome> {
        let mut history: Vec<PortfolioSnapshot> = Vec::new();
        let mut working = start;

        // Batch d+1 must not start until batch d's result is known: each
        // batch's starting state is the prior batch's output.
        for batch in batches {
            working = self.apply_batch(&mut history, working, batch).await?;
        }

        working = self
            .adjust_through_today(&mut history, working, today)
            .await?;

        Ok(ReplayOutcome {
            current: working,
            history_append: history,
        })
    }

    /// One date batch: corporate-action fragmentation of the open interval,
    /// then per-advice-group transaction application.
    async fn apply_batch(
        &self,
        history: &mut Vec<PortfolioSnapshot>,
        prev: PortfolioSnapshot,
        batch: &DateBatch,
    ) -> Result<PortfolioSnapshot> {
        let date = batch.date;
        if date < prev.start_date {
            return Err(Error::Consistency(format!(
                "Batch date {} precedes working snapshot start {}",
                date, prev.start_date
            )));
        }
        debug!(
            "Applying batch of {} transaction(s) on {}",
            batch.transactions.len(),
            date
        );

        let basis = self.fragment_interval(history, prev, date).await?;
        self.apply_transactions_grouped(basis, batch, date).await
    }

    /// Step (a): close `[prev.start_date, date)` via the oracle. Every
    /// returned fragment is retired to history; the last one (or `prev`
    /// itself when no corporate action occurred) is the basis for
    /// transaction application.
    async fn fragment_interval(
        &self,
        history: &mut Vec<PortfolioSnapshot>,
        prev: PortfolioSnapshot,
        date: NaiveDate,
    ) -> Result<PortfolioSnapshot> {
        if prev.start_date >= date {
            // Same-day batch: the working snapshot is updated in place, no
            // zero-length interval is retired.
            return Ok(prev);
        }
        if prev.is_pristine() {
            // Nothing existed before the first transaction; the inception
            // placeholder is discarded, not retired.
            let mut basis = prev;
            basis.start_date = date;
            return Ok(basis);
        }

        let interval_end = date
            .checked_sub_days(Days::new(1))
            .ok_or_else(|| Error::Consistency(format!("Invalid batch date {}", date)))?;

        let fragments = self
            .compute
            .adjust_splits_dividends(&prev, prev.start_date, interval_end)
            .await?;

        if fragments.is_empty() {
            let mut retired = prev.clone();
            retired.end_date = interval_end;
            history.push(retired);
            return Ok(prev);
        }

        validate_fragments(&fragments, prev.start_date, interval_end)?;
        let cash = prev.cash;
        let snapshots: Vec<PortfolioSnapshot> = fragments
            .into_iter()
            .map(|f| snapshot_from_fragment(f, cash, &prev))
            .collect();
        let basis = snapshots
            .last()
            .cloned()
            .ok_or_else(|| Error::Unexpected("fragment list emptied".to_string()))?;
        history.extend(snapshots);
        Ok(basis)
    }

    /// Step (b)/(c): apply the batch's transactions to each touched advice
    /// group independently (concurrently, joined), then re-aggregate. A
    /// failure in any group aborts the whole batch.
    async fn apply_transactions_grouped(
        &self,
        basis: PortfolioSnapshot,
        batch: &DateBatch,
        date: NaiveDate,
    ) -> Result<PortfolioSnapshot> {
        let groups = group_by_advice(&batch.transactions);

        let mut calls = Vec::with_capacity(groups.len());
        for (advice, transactions) in groups {
            let group_positions = basis.advice_group(advice.as_deref());
            let compute = Arc::clone(&self.compute);
            calls.push(async move {
                // The oracle rejecting an application (oversell where
                // shorting is disallowed, and the like) is a state
                // inconsistency, not a transport problem.
                let response = compute
                    .apply_transactions(&group_positions, &transactions)
                    .await
                    .map_err(|e| match e {
                        Error::Oracle(OracleError::Rejected(reason)) => {
                            Error::Consistency(reason)
                        }
                        other => other,
                    })?;
                Ok::<_, Error>((advice, response))
            });
        }
        let results = try_join_all(calls).await?;

        // Untouched groups carry over; aggregate-only snapshots seed the
        // directly-held bucket first so attribution survives the update.
        let mut sub_positions: Vec<Position> =
            if basis.sub_positions.is_empty() && !basis.positions.is_empty() {
                basis
                    .positions
                    .iter()
                    .cloned()
                    .map(|mut p| {
                        p.origin_advice = None;
                        p
                    })
                    .collect()
            } else {
                basis.sub_positions.clone()
            };

        let mut cash = basis.cash;
        for (advice, response) in results {
            cash += response.cash;
            sub_positions.retain(|p| p.origin_advice.as_deref() != advice.as_deref());
            sub_positions.extend(response.positions.into_iter().map(|mut p| {
                p.origin_advice = advice.clone();
                p
            }));
        }

        let mut next = PortfolioSnapshot {
            start_date: date,
            end_date: far_future_date(),
            positions: Vec::new(),
            sub_positions,
            cash,
        };
        next.rebuild_aggregates();
        next.normalize();
        Ok(next)
    }

    /// Step (d): one more fragmentation from the final working start through
    /// `today`. All but the last fragment are retired; the last becomes the
    /// new current snapshot with the far-future sentinel restored.
    async fn adjust_through_today(
        &self,
        history: &mut Vec<PortfolioSnapshot>,
        working: PortfolioSnapshot,
        today: NaiveDate,
    ) -> Result<PortfolioSnapshot> {
        if working.is_pristine() || today < working.start_date {
            return Ok(working);
        }

        let fragments = self
            .compute
            .adjust_splits_dividends(&working, working.start_date, today)
            .await?;
        if fragments.is_empty() {
            return Ok(working);
        }

        validate_fragments(&fragments, working.start_date, today)?;
        let cash = working.cash;
        let mut snapshots: Vec<PortfolioSnapshot> = fragments
            .into_iter()
            .map(|f| snapshot_from_fragment(f, cash, &working))
            .collect();
        let mut current = snapshots
            .pop()
            .ok_or_else(|| Error::Unexpected("fragment list emptied".to_string()))?;
        history.extend(snapshots);
        current.end_date = far_future_date();
        Ok(current)
    }
}

/// Groups transactions by originating advice; `BTreeMap` keeps the group
/// order deterministic.
fn group_by_advice(transactions: &[Transaction]) -> BTreeMap<Option<String>, Vec<Transaction>> {
    let mut groups: BTreeMap<Option<String>, Vec<Transaction>> = BTreeMap::new();
    for txn in transactions {
        groups
            .entry(txn.origin_advice.clone())
            .or_default()
            .push(txn.clone());
    }
    groups
}

/// Fragments must form a strictly increasing, non-overlapping cover of the
/// requested interval.
fn validate_fragments(
    fragments: &[SnapshotFragment],
    interval_start: NaiveDate,
    interval_end: NaiveDate,
) -> Result<()> {
    let mut expected_start = interval_start;
    for fragment in fragments {
        if fragment.start_date != expected_start || fragment.end_date < fragment.start_date {
            return Err(Error::Consistency(format!(
                "Adjustment fragments do not tile [{}, {}]: got [{}, {}], expected start {}",
                interval_start,
                interval_end,
                fragment.start_date,
                fragment.end_date,
                expected_start
            )));
        }
        expected_start = fragment.end_date + Days::new(1);
    }
    let last_end = fragments.last().map(|f| f.end_date);
    if last_end != Some(interval_end) {
        return Err(Error::Consistency(format!(
            "Adjustment fragments end at {:?}, expected {}",
            last_end, interval_end
        )));
    }
    Ok(())
}

fn snapshot_from_fragment(
    fragment: SnapshotFragment,
    cash: Decimal,
    source: &PortfolioSnapshot,
) -> PortfolioSnapshot {
    let sub_positions = if fragment.sub_positions.is_empty() && !source.sub_positions.is_empty() {
        // The oracle may omit sub-positions; attribution is then best-effort
        // reconstructed from the aggregate result.
        warn!(
            "Adjustment fragment [{}, {}] omitted sub-positions; deriving from aggregate",
            fragment.start_date, fragment.end_date
        );
        fragment
            .positions
            .iter()
            .cloned()
            .map(|mut p| {
                p.origin_advice = None;
                p
            })
            .collect()
    } else {
        fragment.sub_positions
    };

    let mut snapshot = PortfolioSnapshot {
        start_date: fragment.start_date,
        end_date: fragment.end_date,
        positions: fragment.positions,
        sub_positions,
        cash,
    };
    snapshot.normalize();
    snapshot
}
