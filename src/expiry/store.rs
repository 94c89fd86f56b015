use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::classify;
use crate::models::{ExpiryStatus, TrackedMedicine, TrackedMedicineEntry};

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Tracking store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tracking store could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No tracked medicine with id {0}")]
    NotFound(Uuid),

    #[error("Medicine name must not be empty")]
    EmptyName,
}

/// On-disk document. The single key is the storage identifier
/// (`config::TRACKED_MEDICINES_KEY`).
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(rename = "medicipher.tracked_medicines.v1", default)]
    entries: Vec<TrackedMedicineEntry>,
}

/// Raised by [`ExpiryTracker::add`] when the medicine is already expired.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpiryNotice {
    pub entry_id: Uuid,
    pub name: String,
    pub expiry_date: NaiveDate,
    pub message: String,
}

impl ExpiryNotice {
    fn for_entry(entry: &TrackedMedicineEntry) -> Self {
        Self {
            entry_id: entry.id,
            name: entry.name.clone(),
            expiry_date: entry.expiry_date,
            message: format!(
                "{} expired on {}. Do not use it; dispose of it safely.",
                entry.name,
                entry.expiry_date.format("%Y-%m-%d")
            ),
        }
    }
}

/// File-backed collection of tracked medicines.
///
/// Every mutation is written to disk (temp file + rename) before the
/// in-memory list changes, so a failed write leaves both views unchanged.
#[derive(Debug)]
pub struct ExpiryTracker {
    path: PathBuf,
    entries: Vec<TrackedMedicineEntry>,
}

impl ExpiryTracker {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TrackerError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str::<StoreDocument>(&raw)?.entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "Tracking store opened");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries with the status recorded when each was added.
    pub fn entries(&self) -> &[TrackedMedicineEntry] {
        &self.entries
    }

    /// Entries with the status recomputed against `today`.
    pub fn entries_as_of(&self, today: NaiveDate) -> Vec<TrackedMedicineEntry> {
        self.entries
            .iter()
            .map(|entry| TrackedMedicineEntry {
                status: classify(entry.expiry_date, today),
                ..entry.clone()
            })
            .collect()
    }

    /// Record a medicine. Returns a notice when it is already expired.
    pub fn add(
        &mut self,
        name: &str,
        expiry_date: NaiveDate,
        today: NaiveDate,
    ) -> Result<(TrackedMedicineEntry, Option<ExpiryNotice>), TrackerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TrackerError::EmptyName);
        }

        let entry = TrackedMedicineEntry {
            id: Uuid::new_v4(),
            name: name.to_string(),
            expiry_date,
            status: classify(expiry_date, today),
            created_at: Utc::now(),
        };

        let mut updated = self.entries.clone();
        updated.push(entry.clone());
        self.commit(updated)?;

        tracing::info!(id = %entry.id, status = %entry.status, "Tracked medicine added");

        let notice = (entry.status == ExpiryStatus::Expired).then(|| ExpiryNotice::for_entry(&entry));
        Ok((entry, notice))
    }

    /// Delete an entry by id and return it.
    pub fn remove(&mut self, id: Uuid) -> Result<TrackedMedicineEntry, TrackerError> {
        let position = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(TrackerError::NotFound(id))?;

        let mut updated = self.entries.clone();
        let removed = updated.remove(position);
        self.commit(updated)?;

        tracing::info!(id = %id, "Tracked medicine removed");
        Ok(removed)
    }

    /// Persist statuses recomputed against `today`. Returns how many changed.
    pub fn refresh(&mut self, today: NaiveDate) -> Result<usize, TrackerError> {
        let updated = self.entries_as_of(today);
        let changed = updated
            .iter()
            .zip(&self.entries)
            .filter(|(new, old)| new.status != old.status)
            .count();

        if changed > 0 {
            self.commit(updated)?;
            tracing::info!(changed, "Tracked medicine statuses refreshed");
        }
        Ok(changed)
    }

    /// The `(name, expiry_date)` pairs fed into an analysis request.
    pub fn as_tracked_medicines(&self) -> Vec<TrackedMedicine> {
        self.entries
            .iter()
            .map(|e| TrackedMedicine::new(e.name.clone(), e.expiry_date))
            .collect()
    }

    fn commit(&mut self, entries: Vec<TrackedMedicineEntry>) -> Result<(), TrackerError> {
        let document = StoreDocument { entries };
        write_atomically(&self.path, &document)?;
        self.entries = document.entries;
        Ok(())
    }
}

fn write_atomically(path: &Path, document: &StoreDocument) -> Result<(), TrackerError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, document)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| TrackerError::Io(e.error))?;
    Ok(())
}
