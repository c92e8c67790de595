use serde::{Deserialize, Serialize};

/// Milliseconds elapsed in the current run since the last save.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionAccumulator {
    total_ms: u64,
}

impl SessionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_tick(&mut self, delta_ms: u64) {
        self.total_ms = self.total_ms.saturating_add(delta_ms);
    }

    /// Take the accumulated total, leaving zero behind.
    ///
    /// Must be called exactly once per persisted save.
    pub fn drain_and_reset(&mut self) -> u64 {
        std::mem::take(&mut self.total_ms)
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_and_drains() {
        let mut acc = SessionAccumulator::new();
        acc.on_tick(1000);
        acc.on_tick(1000);
        assert_eq!(acc.total_ms(), 2000);
        assert_eq!(acc.drain_and_reset(), 2000);
        assert_eq!(acc.total_ms(), 0);
        assert_eq!(acc.drain_and_reset(), 0);
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        let mut acc = SessionAccumulator::new();
        acc.on_tick(u64::MAX);
        acc.on_tick(1);
        assert_eq!(acc.total_ms(), u64::MAX);
    }
}
