//! Shared constants for the reconstruction engine.

use chrono::NaiveDate;

/// Minimum quantity considered significant in position aggregates.
pub const QUANTITY_THRESHOLD: &str = "0.00000001";

/// Maximum number of compare-and-swap write attempts before a conflict is
/// surfaced to the caller.
pub const MAX_WRITE_ATTEMPTS: usize = 3;

/// Sentinel start date of a portfolio's very first snapshot.
pub fn inception_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
}

/// Sentinel end date marking a snapshot as still open.
pub fn far_future_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap()
}
