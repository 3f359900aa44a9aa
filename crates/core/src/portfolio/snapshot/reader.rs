//! Point-in-Time Reader: selects the snapshot covering a given date.

use chrono::NaiveDate;
use log::warn;

use crate::portfolio::snapshot::{Portfolio, PortfolioSnapshot};

/// How a lookup was resolved. `FallbackToCurrent` is a deliberate tolerance
/// for incomplete history (pre-inception dates, gaps); it is typed and
/// logged rather than silent so callers can tell it apart from a real hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotResolution {
    Current,
    Historical,
    FallbackToCurrent,
}

/// A resolved snapshot together with how it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotLookup {
    pub snapshot: PortfolioSnapshot,
    pub resolution: SnapshotResolution,
}

/// Returns the snapshot whose `[start_date, end_date]` covers `date`:
/// the current snapshot for any date at or after its start, a history entry
/// otherwise, and the current snapshot again when nothing matches.
pub fn snapshot_at(portfolio: &Portfolio, date: NaiveDate) -> SnapshotLookup {
    if date >= portfolio.current.start_date {
        return SnapshotLookup {
            snapshot: portfolio.current.clone(),
            resolution: SnapshotResolution::Current,
        };
    }

    if let Some(entry) = portfolio.history.iter().find(|s| s.contains(date)) {
        return SnapshotLookup {
            snapshot: entry.clone(),
            resolution: SnapshotResolution::Historical,
        };
    }

    warn!(
        "No snapshot covers {} for portfolio {}; falling back to current snapshot",
        date, portfolio.id
    );
    SnapshotLookup {
        snapshot: portfolio.current.clone(),
        resolution: SnapshotResolution::FallbackToCurrent,
    }
}

/// History entries overlapping `[start, end]`, ascending, with the current
/// snapshot included when the range reaches it.
pub fn history_between(
    portfolio: &Portfolio,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Vec<PortfolioSnapshot> {
    let mut result: Vec<PortfolioSnapshot> = portfolio
        .history
        .iter()
        .filter(|s| {
            start.map_or(true, |from| s.end_date >= from)
                && end.map_or(true, |to| s.start_date <= to)
        })
        .cloned()
        .collect();
    if end.map_or(true, |to| to >= portfolio.current.start_date) {
        result.push(portfolio.current.clone());
    }
    result
}
