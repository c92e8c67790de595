//! Per-day totals over the session log.
//!
//! Saves never merge: every call appends its own row. Reads sum whatever
//! rows match the date key, so `round_count` counts saves rather than
//! finished sessions. A run that was cancelled and restarted twice shows
//! up as three rounds.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::repository::{SessionRecord, SessionRepository};
use crate::error::Result;

/// Format a day as the store's key, `dd-mm-yyyy`.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

/// Derived view of one day. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub date: String,
    pub total_ms: u64,
    pub round_count: u32,
}

#[derive(Clone)]
pub struct DailyAggregateStore {
    repo: Arc<dyn SessionRepository>,
}

impl DailyAggregateStore {
    pub fn new(repo: Arc<dyn SessionRepository>) -> Self {
        Self { repo }
    }

    /// Append one contribution for `date`.
    ///
    /// # Errors
    /// Returns `DatabaseError::WriteFailed` if the insert fails. Not retried.
    pub fn save(&self, date: &str, contributed_ms: u64) -> Result<bool> {
        let row_id = self.repo.insert(&SessionRecord {
            date: date.to_string(),
            contributed_ms,
        })?;
        tracing::debug!(date, contributed_ms, row_id, "session saved");
        Ok(row_id != -1)
    }

    /// Sum and count every record whose date contains `date`.
    ///
    /// The match is a substring match: "1-1-2024" also picks up
    /// "21-1-2024". Pass a full `dd-mm-yyyy` key.
    ///
    /// # Errors
    /// Returns `DatabaseError::ReadFailed` if the query fails.
    pub fn retrieve_by_date(&self, date: &str) -> Result<DailyAggregate> {
        let records = self.repo.find_by_date(date)?;
        let aggregate = records.iter().fold(
            DailyAggregate {
                date: date.to_string(),
                ..DailyAggregate::default()
            },
            |mut acc, record| {
                acc.total_ms = acc.total_ms.saturating_add(record.contributed_ms);
                acc.round_count = acc.round_count.saturating_add(1);
                acc
            },
        );
        Ok(aggregate)
    }
}
