use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::DailyAggregate;
use crate::timer::{TimerSnapshot, TimerType};

/// Every engine command produces an Event.
/// The CLI prints them; the service logs them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        timer_type: TimerType,
        remaining_ms: i64,
        rounds: u32,
        at: DateTime<Utc>,
    },
    TimerCancelled {
        timer_type: TimerType,
        remaining_ms: i64,
        saved_ms: u64,
        reset: bool,
        at: DateTime<Utc>,
    },
    /// Countdown reached zero during a tick.
    TimerCompleted {
        timer_type: TimerType,
        saved_ms: u64,
        at: DateTime<Utc>,
    },
    TypeChanged {
        from: TimerType,
        to: TimerType,
        remaining_ms: i64,
        saved_ms: u64,
        at: DateTime<Utc>,
    },
    TimeAdjusted {
        delta_ms: i64,
        remaining_ms: i64,
        is_running: bool,
        rounds: u32,
        at: DateTime<Utc>,
    },
    TodayLoaded {
        aggregate: DailyAggregate,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        #[serde(flatten)]
        snapshot: TimerSnapshot,
        at: DateTime<Utc>,
    },
}
