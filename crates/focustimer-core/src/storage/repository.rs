//! Storage port for session records, plus an in-memory adapter.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;

/// One persisted contribution. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Day key, `dd-mm-yyyy`.
    pub date: String,
    pub contributed_ms: u64,
}

/// Append-only record storage with a loose date lookup.
pub trait SessionRepository: Send + Sync {
    /// Append a record. Returns the new row id.
    fn insert(&self, record: &SessionRecord) -> Result<i64, DatabaseError>;

    /// Every record whose date *contains* `date`.
    fn find_by_date(&self, date: &str) -> Result<Vec<SessionRecord>, DatabaseError>;
}

/// Vec-backed repository for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    records: Mutex<Vec<SessionRecord>>,
    fail: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository whose every operation fails.
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Copy of everything written so far, in insertion order.
    pub fn records(&self) -> Vec<SessionRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl SessionRepository for MemoryRepository {
    fn insert(&self, record: &SessionRecord) -> Result<i64, DatabaseError> {
        if self.fail {
            return Err(DatabaseError::write(&record.date, "storage unavailable"));
        }
        let mut records = self
            .records
            .lock()
            .map_err(|_| DatabaseError::write(&record.date, "poisoned lock"))?;
        records.push(record.clone());
        Ok(records.len() as i64)
    }

    fn find_by_date(&self, date: &str) -> Result<Vec<SessionRecord>, DatabaseError> {
        if self.fail {
            return Err(DatabaseError::read(date, "storage unavailable"));
        }
        let records = self
            .records
            .lock()
            .map_err(|_| DatabaseError::read(date, "poisoned lock"))?;
        Ok(records
            .iter()
            .filter(|r| r.date.contains(date))
            .cloned()
            .collect())
    }
}
