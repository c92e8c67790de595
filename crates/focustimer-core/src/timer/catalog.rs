use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const ONE_SEC_MS: u64 = 1_000;
pub const ONE_MIN_MS: u64 = 60_000;

/// Kind of countdown. Nominal durations are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimerType {
    Focus,
    ShortBreak,
    LongBreak,
}

impl TimerType {
    pub const ALL: [TimerType; 3] = [TimerType::Focus, TimerType::ShortBreak, TimerType::LongBreak];

    pub fn all() -> &'static [TimerType] {
        &Self::ALL
    }

    /// Nominal duration in minutes.
    pub fn duration_min(self) -> u64 {
        match self {
            TimerType::Focus => 25,
            TimerType::ShortBreak => 5,
            TimerType::LongBreak => 15,
        }
    }

    /// Nominal duration in milliseconds.
    pub fn duration_ms(self) -> u64 {
        self.duration_min() * ONE_MIN_MS
    }

    pub fn title(self) -> &'static str {
        match self {
            TimerType::Focus => "Focus Time",
            TimerType::ShortBreak => "Short Break",
            TimerType::LongBreak => "Long Break",
        }
    }

    /// Stable key used by config files and the CLI.
    pub fn key(self) -> &'static str {
        match self {
            TimerType::Focus => "focus",
            TimerType::ShortBreak => "short-break",
            TimerType::LongBreak => "long-break",
        }
    }
}

impl Default for TimerType {
    fn default() -> Self {
        TimerType::Focus
    }
}

impl fmt::Display for TimerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for TimerType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        TimerType::ALL
            .iter()
            .copied()
            .find(|t| t.key() == normalized)
            .ok_or_else(|| ValidationError::UnknownTimerType(s.to_string()))
    }
}
