//! Expiry classification and the locally persisted tracking store.
//!
//! Classification is pure and total. Whether to alert on a status is the
//! caller's decision.

pub mod alerts;
pub mod store;

pub use alerts::*;
pub use store::*;

use chrono::{DateTime, NaiveDate, TimeZone};

use crate::models::ExpiryStatus;

/// Days before expiry at which a medicine stops being `safe`.
pub const WARNING_WINDOW_DAYS: i64 = 30;

/// Classify an expiry date against a reference date.
///
/// `diff = expiry - reference` in whole days:
/// `<= 0` expired, `1..=29` warning, `>= 30` safe.
pub fn classify(expiry: NaiveDate, reference: NaiveDate) -> ExpiryStatus {
    let diff = expiry.signed_duration_since(reference).num_days();
    if diff <= 0 {
        ExpiryStatus::Expired
    } else if diff < WARNING_WINDOW_DAYS {
        ExpiryStatus::Warning
    } else {
        ExpiryStatus::Safe
    }
}

/// Classify two instants after truncating both to calendar dates in their
/// own time zone.
pub fn classify_at<Tz: TimeZone>(expiry: DateTime<Tz>, reference: DateTime<Tz>) -> ExpiryStatus {
    classify(expiry.date_naive(), reference.date_naive())
}

/// Whole days until expiry; negative once expired.
pub fn days_until(expiry: NaiveDate, reference: NaiveDate) -> i64 {
    expiry.signed_duration_since(reference).num_days()
}
