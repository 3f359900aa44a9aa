//! Transaction Batcher.
//!
//! Merges an incoming transaction list into the existing ledger, groups the
//! result into date-ordered same-day batches and decides whether the replay
//! can append to the current timeline or must rebuild it from inception.

use chrono::{DateTime, Days, NaiveDate, Utc};
use log::debug;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::errors::{Error, Result, ValidationError};
use crate::ledger::{Transaction, TransactionAction};

/// How the replay engine should consume the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMode {
    /// New activity strictly extends the timeline: replay only the incoming
    /// transactions on top of the current snapshot.
    Append,
    /// The past changed: replay the entire merged non-deleted ledger from an
    /// empty snapshot at the inception sentinel date.
    Create,
}

/// All transactions of one calendar date, in submission order.
#[derive(Debug, Clone)]
pub struct DateBatch {
    pub date: NaiveDate,
    pub transactions: Vec<Transaction>,
}

/// Output of [`plan`]: the batches to replay plus the merged ledger to
/// persist once the replay succeeds.
#[derive(Debug, Clone)]
pub struct ReplayPlan {
    pub mode: ReplayMode,
    pub batches: Vec<DateBatch>,
    pub ledger: Vec<Transaction>,
}

/// Builds a replay plan for `incoming` against the existing `ledger`.
///
/// Fails fast with no partial effect: future-dated transactions (later than
/// tomorrow relative to `now`) and unknown ids on update/delete are hard
/// errors, never silent no-ops.
pub fn plan(
    ledger: &[Transaction],
    incoming: Vec<Transaction>,
    action: TransactionAction,
    current_start: NaiveDate,
    now: DateTime<Utc>,
) -> Result<ReplayPlan> {
    validate_incoming(&incoming, action, now)?;

    let mut merged: Vec<Transaction> = ledger.to_vec();
    let mut incoming = incoming;

    match action {
        TransactionAction::Add => {
            for i in 0..incoming.len() {
                if incoming[i].id.is_empty() {
                    incoming[i].id = Uuid::new_v4().to_string();
                } else if merged
                    .iter()
                    .chain(incoming[..i].iter())
                    .any(|t| t.id == incoming[i].id)
                {
                    return Err(ValidationError::DuplicateId(incoming[i].id.clone()).into());
                }
            }
            merged.extend(incoming.iter().cloned());
        }
        TransactionAction::Update => {
            for txn in &incoming {
                let existing = find_mut(&mut merged, &txn.id)?;
                let deleted = existing.deleted;
                *existing = txn.clone();
                existing.deleted = deleted;
            }
        }
        TransactionAction::Delete => {
            for txn in &incoming {
                find_mut(&mut merged, &txn.id)?.deleted = true;
            }
        }
    }

    let mode = decide_mode(ledger, &incoming, action, current_start);
    let batches = match mode {
        ReplayMode::Append => group_by_date(incoming),
        ReplayMode::Create => {
            group_by_date(merged.iter().filter(|t| !t.deleted).cloned().collect())
        }
    };

    debug!(
        "Planned {} replay: {} date batch(es), merged ledger has {} entries",
        match mode {
            ReplayMode::Append => "append",
            ReplayMode::Create => "create",
        },
        batches.len(),
        merged.len()
    );

    Ok(ReplayPlan {
        mode,
        batches,
        ledger: merged,
    })
}

fn validate_incoming(
    incoming: &[Transaction],
    action: TransactionAction,
    now: DateTime<Utc>,
) -> Result<()> {
    let tomorrow = now.date_naive() + Days::new(1);
    for txn in incoming {
        if action != TransactionAction::Delete {
            if txn.trade_date() > tomorrow {
                return Err(ValidationError::FutureDated {
                    id: txn.id.clone(),
                    date: txn.trade_date(),
                }
                .into());
            }
            if txn.quantity.is_zero() {
                return Err(ValidationError::ZeroQuantity {
                    id: txn.id.clone(),
                }
                .into());
            }
            if txn.price.is_sign_negative() {
                return Err(ValidationError::NegativePrice {
                    id: txn.id.clone(),
                }
                .into());
            }
        }
        if action != TransactionAction::Add && txn.id.is_empty() {
            return Err(ValidationError::InvalidInput(format!(
                "{} requires a transaction id",
                action.as_str()
            ))
            .into());
        }
    }
    Ok(())
}

fn find_mut<'a>(ledger: &'a mut [Transaction], id: &str) -> Result<&'a mut Transaction> {
    ledger
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| Error::NotFound(format!("Transaction {} not found in ledger", id)))
}

/// Append only when strictly new activity lands at or after everything the
/// timeline already knows about. Updates and deletes rewrite the past, so
/// they always rebuild; rebuilding is also what makes re-submitting an
/// update idempotent.
fn decide_mode(
    ledger: &[Transaction],
    incoming: &[Transaction],
    action: TransactionAction,
    current_start: NaiveDate,
) -> ReplayMode {
    if action != TransactionAction::Add {
        return ReplayMode::Create;
    }
    let last_existing = ledger
        .iter()
        .filter(|t| !t.deleted)
        .map(Transaction::trade_date)
        .max();
    let last_existing = match last_existing {
        Some(date) => date,
        None => return ReplayMode::Create,
    };
    let appendable = incoming
        .iter()
        .all(|t| t.trade_date() >= current_start && t.trade_date() >= last_existing);
    if appendable {
        ReplayMode::Append
    } else {
        ReplayMode::Create
    }
}

/// Groups by calendar date (ascending); submission order is preserved within
/// a day.
fn group_by_date(transactions: Vec<Transaction>) -> Vec<DateBatch> {
    let mut by_date: BTreeMap<NaiveDate, Vec<Transaction>> = BTreeMap::new();
    for txn in transactions {
        by_date.entry(txn.trade_date()).or_default().push(txn);
    }
    by_date
        .into_iter()
        .map(|(date, transactions)| DateBatch { date, transactions })
        .collect()
}
