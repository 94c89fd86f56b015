use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ExpiryStatus;

/// A medicine the user keeps at home, with the expiry date printed on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedMedicine {
    pub name: String,
    pub expiry_date: NaiveDate,
}

impl TrackedMedicine {
    pub fn new(name: impl Into<String>, expiry_date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            expiry_date,
        }
    }
}

/// Persisted record owned by the expiry tracker.
///
/// `status` is the classification at the time the entry was recorded. Readers
/// that need today's view go through `ExpiryTracker::entries_as_of`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedMedicineEntry {
    pub id: Uuid,
    pub name: String,
    pub expiry_date: NaiveDate,
    pub status: ExpiryStatus,
    pub created_at: DateTime<Utc>,
}
