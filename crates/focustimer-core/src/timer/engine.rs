//! Timer engine implementation.
//!
//! The engine is a single-countdown state machine. It does not sleep or
//! spawn: it asks a [`TickSource`] for a repeating schedule and expects its
//! owner to feed the resulting ticks back through [`TimerEngine::tick`].
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (cancel | finish) -> Idle
//! ```
//!
//! Finishing is a tick that drives the countdown to zero or below; it
//! behaves like `cancel(false)` and leaves the countdown where it landed.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(store, Box::new(ticker));
//! engine.start()?;
//! // For every tick the source delivers:
//! engine.tick(1000)?; // Ok(Some(Event::TimerCompleted)) when the countdown ends
//! ```

use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::accumulator::SessionAccumulator;
use super::catalog::{TimerType, ONE_MIN_MS};
use super::ticker::{TickHandle, TickSource, TICK_PERIOD};
use crate::error::Result;
use crate::events::Event;
use crate::storage::{date_key, DailyAggregate, DailyAggregateStore};

/// Point-in-time view of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub timer_type: TimerType,
    /// Signed: an increase can push it past the nominal duration and a
    /// decrease can push it below zero.
    pub remaining_ms: i64,
    pub total_ms: u64,
    pub is_running: bool,
    /// Lifetime round counter.
    pub rounds: u32,
    /// Focus time recorded today, including the unsaved part of this run.
    pub today_ms: u64,
    /// Time accumulated since the last save.
    pub accumulated_ms: u64,
}

/// Core timer engine.
pub struct TimerEngine {
    timer_type: TimerType,
    remaining_ms: i64,
    running: bool,
    rounds: u32,
    today_ms: u64,
    accumulator: SessionAccumulator,
    store: DailyAggregateStore,
    ticker: Box<dyn TickSource>,
    handle: Option<Box<dyn TickHandle>>,
    today: fn() -> NaiveDate,
}

impl TimerEngine {
    /// Create an idle Focus timer.
    pub fn new(store: DailyAggregateStore, ticker: Box<dyn TickSource>) -> Self {
        Self {
            timer_type: TimerType::Focus,
            remaining_ms: nominal_ms(TimerType::Focus),
            running: false,
            rounds: 0,
            today_ms: 0,
            accumulator: SessionAccumulator::new(),
            store,
            ticker,
            handle: None,
            today: local_today,
        }
    }

    /// Start out on a different type without recording anything.
    pub fn with_initial_type(mut self, timer_type: TimerType) -> Self {
        self.timer_type = timer_type;
        self.remaining_ms = nominal_ms(timer_type);
        self
    }

    /// Replace the source of "today" used for date keys.
    pub fn with_today(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn timer_type(&self) -> TimerType {
        self.timer_type
    }

    pub fn remaining_ms(&self) -> i64 {
        self.remaining_ms
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn today_ms(&self) -> u64 {
        self.today_ms
    }

    pub fn accumulated_ms(&self) -> u64 {
        self.accumulator.total_ms()
    }

    pub fn today_key(&self) -> String {
        date_key((self.today)())
    }

    pub fn store(&self) -> &DailyAggregateStore {
        &self.store
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            timer_type: self.timer_type,
            remaining_ms: self.remaining_ms,
            total_ms: self.timer_type.duration_ms(),
            is_running: self.running,
            rounds: self.rounds,
            today_ms: self.today_ms,
            accumulated_ms: self.accumulator.total_ms(),
        }
    }

    pub fn snapshot_event(&self) -> Event {
        Event::StateSnapshot {
            snapshot: self.snapshot(),
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin (or restart) the countdown.
    ///
    /// A running schedule is replaced, never doubled. The accumulator is
    /// left alone. Rounds only count transitions out of the stopped state.
    ///
    /// A countdown already at or below zero finishes on the spot: nothing
    /// is scheduled, no tick is credited, and the accumulator is saved.
    /// The returned event is then `Event::TimerCompleted`.
    ///
    /// # Errors
    /// Returns the storage error if that immediate finish fails to save.
    pub fn start(&mut self) -> Result<Event> {
        if !self.running {
            self.rounds = self.rounds.saturating_add(1);
        }
        self.stop_ticking();
        self.running = true;
        if self.remaining_ms <= 0 {
            return self.finish();
        }
        self.handle = Some(self.ticker.schedule(TICK_PERIOD));
        tracing::debug!(
            timer_type = %self.timer_type,
            remaining_ms = self.remaining_ms,
            rounds = self.rounds,
            "timer started"
        );
        Ok(Event::TimerStarted {
            timer_type: self.timer_type,
            remaining_ms: self.remaining_ms,
            rounds: self.rounds,
            at: Utc::now(),
        })
    }

    /// Deliver one tick. Ignored while stopped.
    ///
    /// Returns `Some(Event::TimerCompleted)` when the countdown ends.
    ///
    /// # Errors
    /// Returns the storage error if saving the finished run fails. The
    /// engine is already stopped when that happens.
    pub fn tick(&mut self, elapsed_ms: u64) -> Result<Option<Event>> {
        if !self.running {
            return Ok(None);
        }
        self.remaining_ms = self.remaining_ms.saturating_sub(clamp_i64(elapsed_ms));
        self.accumulator.on_tick(elapsed_ms);
        self.today_ms = self.today_ms.saturating_add(elapsed_ms);

        if self.remaining_ms > 0 {
            return Ok(None);
        }
        self.finish().map(Some)
    }

    /// Stop the countdown and persist the accumulated time.
    ///
    /// The save happens every time, even for an empty accumulator. The
    /// countdown goes back to the nominal duration when `reset` is set or
    /// when the timer was not running.
    ///
    /// # Errors
    /// Returns the storage error if the save fails. State changes are
    /// applied first, so the engine is stopped either way.
    pub fn cancel(&mut self, reset: bool) -> Result<Event> {
        let saved_ms = self.halt(reset)?;
        Ok(Event::TimerCancelled {
            timer_type: self.timer_type,
            remaining_ms: self.remaining_ms,
            saved_ms,
            reset,
            at: Utc::now(),
        })
    }

    /// Switch type and reset the countdown to its nominal duration.
    ///
    /// # Errors
    /// Returns the storage error from the implied cancel.
    pub fn change_type(&mut self, timer_type: TimerType) -> Result<Event> {
        let from = self.timer_type;
        self.timer_type = timer_type;
        let saved_ms = self.halt(true)?;
        Ok(Event::TypeChanged {
            from,
            to: timer_type,
            remaining_ms: self.remaining_ms,
            saved_ms,
            at: Utc::now(),
        })
    }

    /// Add `minutes` to the countdown, restarting it if running.
    ///
    /// # Errors
    /// Returns the storage error if the restart finishes the countdown and
    /// the save fails.
    pub fn increase_time(&mut self, minutes: u32) -> Result<Event> {
        let delta_ms = minutes_ms(minutes);
        self.remaining_ms = self.remaining_ms.saturating_add(delta_ms);
        self.restart_if_running()?;
        Ok(self.adjusted(delta_ms))
    }

    /// Take `minutes` off the countdown, restarting it if running. A
    /// countdown pushed below zero is cancelled afterwards, unless the
    /// restart already finished it.
    ///
    /// # Errors
    /// Returns the storage error from the finish or the follow-up cancel.
    pub fn decrease_time(&mut self, minutes: u32) -> Result<Event> {
        let delta_ms = minutes_ms(minutes);
        self.remaining_ms = self.remaining_ms.saturating_sub(delta_ms);
        let finished = self.restart_if_running()?;
        if self.remaining_ms < 0 && !finished {
            self.halt(false)?;
        }
        Ok(self.adjusted(-delta_ms))
    }

    /// Seed the round counter and today's total from the store.
    ///
    /// # Errors
    /// Returns the storage error if the read fails; nothing is changed.
    pub fn load_today(&mut self) -> Result<DailyAggregate> {
        let aggregate = self.store.retrieve_by_date(&self.today_key())?;
        self.rounds = aggregate.round_count;
        self.today_ms = aggregate.total_ms;
        Ok(aggregate)
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Countdown reached zero while running. Like `cancel(false)`, but the
    /// countdown keeps the value it landed on.
    fn finish(&mut self) -> Result<Event> {
        let timer_type = self.timer_type;
        let saved_ms = self.halt(false)?;
        tracing::info!(%timer_type, saved_ms, "timer finished");
        Ok(Event::TimerCompleted {
            timer_type,
            saved_ms,
            at: Utc::now(),
        })
    }

    /// Shared body of cancel/finish/change_type. Returns the saved amount.
    fn halt(&mut self, reset: bool) -> Result<u64> {
        let saved = self.persist_session();
        self.stop_ticking();
        if !self.running || reset {
            self.remaining_ms = nominal_ms(self.timer_type);
        }
        self.running = false;
        saved
    }

    fn persist_session(&mut self) -> Result<u64> {
        let contributed_ms = self.accumulator.drain_and_reset();
        let date = self.today_key();
        match self.store.save(&date, contributed_ms) {
            Ok(_) => Ok(contributed_ms),
            Err(err) => {
                tracing::warn!(%date, contributed_ms, error = %err, "session save failed, contribution dropped");
                Err(err)
            }
        }
    }

    /// The adjust path goes through the public start transition, so every
    /// adjustment while running counts another round. Returns `true` when
    /// the restart finished the countdown instead.
    fn restart_if_running(&mut self) -> Result<bool> {
        if !self.running {
            return Ok(false);
        }
        self.stop_ticking();
        self.running = false;
        let event = self.start()?;
        Ok(matches!(event, Event::TimerCompleted { .. }))
    }

    fn stop_ticking(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.cancel();
        }
    }

    fn adjusted(&self, delta_ms: i64) -> Event {
        Event::TimeAdjusted {
            delta_ms,
            remaining_ms: self.remaining_ms,
            is_running: self.running,
            rounds: self.rounds,
            at: Utc::now(),
        }
    }
}

impl Drop for TimerEngine {
    fn drop(&mut self) {
        self.stop_ticking();
    }
}

fn nominal_ms(timer_type: TimerType) -> i64 {
    clamp_i64(timer_type.duration_ms())
}

fn minutes_ms(minutes: u32) -> i64 {
    i64::from(minutes) * clamp_i64(ONE_MIN_MS)
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryRepository;
    use crate::timer::ManualTicker;
    use std::sync::Arc;

    fn fixed_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn engine() -> (TimerEngine, ManualTicker, Arc<MemoryRepository>) {
        let repo = Arc::new(MemoryRepository::new());
        let ticker = ManualTicker::new();
        let engine = TimerEngine::new(DailyAggregateStore::new(repo.clone()), Box::new(ticker.clone()))
            .with_today(fixed_day);
        (engine, ticker, repo)
    }

    #[test]
    fn new_engine_is_idle_focus() {
        let (engine, _, _) = engine();
        assert_eq!(engine.timer_type(), TimerType::Focus);
        assert_eq!(engine.remaining_ms(), 1_500_000);
        assert!(!engine.is_running());
        assert_eq!(engine.rounds(), 0);
    }

    #[test]
    fn three_ticks_after_start() {
        let (mut engine, _, repo) = engine();
        engine.start().unwrap();
        for _ in 0..3 {
            assert!(engine.tick(1000).unwrap().is_none());
        }
        assert_eq!(engine.remaining_ms(), 1_497_000);
        assert_eq!(engine.accumulated_ms(), 3_000);
        assert_eq!(engine.today_ms(), 3_000);
        assert!(repo.records().is_empty());
    }

    #[test]
    fn tick_is_ignored_while_idle() {
        let (mut engine, _, _) = engine();
        assert!(engine.tick(1000).unwrap().is_none());
        assert_eq!(engine.remaining_ms(), 1_500_000);
        assert_eq!(engine.accumulated_ms(), 0);
    }

    #[test]
    fn start_while_running_keeps_one_schedule_and_one_round() {
        let (mut engine, ticker, _) = engine();
        engine.start().unwrap();
        engine.tick(1000).unwrap();
        engine.start().unwrap();
        assert_eq!(ticker.scheduled(), 2);
        assert_eq!(ticker.active(), 1);
        assert_eq!(engine.rounds(), 1);
        assert_eq!(engine.accumulated_ms(), 1000);
    }

    #[test]
    fn cancel_saves_and_keeps_remaining_when_running() {
        let (mut engine, ticker, repo) = engine();
        engine.start().unwrap();
        engine.tick(1000).unwrap();
        engine.tick(1000).unwrap();
        let event = engine.cancel(false).unwrap();
        assert!(matches!(event, Event::TimerCancelled { saved_ms: 2000, .. }));
        assert!(!engine.is_running());
        assert_eq!(engine.remaining_ms(), 1_498_000);
        assert_eq!(ticker.active(), 0);
        assert_eq!(repo.records().len(), 1);
        assert_eq!(repo.records()[0].date, "01-01-2024");
        assert_eq!(repo.records()[0].contributed_ms, 2000);
    }

    #[test]
    fn cancel_while_idle_resets_and_still_saves_zero() {
        let (mut engine, _, repo) = engine();
        engine.increase_time(3).unwrap();
        engine.cancel(false).unwrap();
        assert_eq!(engine.remaining_ms(), 1_500_000);
        assert_eq!(repo.records().len(), 1);
        assert_eq!(repo.records()[0].contributed_ms, 0);
    }

    #[test]
    fn cancel_twice_without_schedule_is_idempotent() {
        let (mut engine, ticker, _) = engine();
        assert!(engine.cancel(false).is_ok());
        assert!(engine.cancel(false).is_ok());
        assert!(!engine.is_running());
        assert_eq!(engine.remaining_ms(), 1_500_000);
        assert_eq!(ticker.active(), 0);
    }

    #[test]
    fn finishing_saves_and_stops() {
        let (mut engine, ticker, repo) = engine();
        engine.change_type(TimerType::ShortBreak).unwrap();
        engine.decrease_time(4).unwrap();
        assert_eq!(engine.remaining_ms(), 60_000);
        engine.start().unwrap();
        let mut completed = None;
        for _ in 0..60 {
            if let Some(event) = engine.tick(1000).unwrap() {
                completed = Some(event);
            }
        }
        assert!(matches!(
            completed,
            Some(Event::TimerCompleted { timer_type: TimerType::ShortBreak, saved_ms: 60_000, .. })
        ));
        assert!(!engine.is_running());
        assert_eq!(engine.remaining_ms(), 0);
        assert_eq!(ticker.active(), 0);
        assert_eq!(repo.records().last().unwrap().contributed_ms, 60_000);
    }

    #[test]
    fn change_type_resets_to_new_nominal_duration() {
        let (mut engine, _, _) = engine();
        engine.increase_time(7).unwrap();
        engine.change_type(TimerType::LongBreak).unwrap();
        assert_eq!(engine.remaining_ms(), 900_000);

        engine.start().unwrap();
        engine.tick(1000).unwrap();
        let event = engine.change_type(TimerType::Focus).unwrap();
        assert!(matches!(
            event,
            Event::TypeChanged { from: TimerType::LongBreak, to: TimerType::Focus, saved_ms: 1000, .. }
        ));
        assert_eq!(engine.remaining_ms(), 1_500_000);
        assert!(!engine.is_running());
    }

    #[test]
    fn increase_while_running_restarts_and_counts_another_round() {
        let (mut engine, ticker, repo) = engine();
        engine.start().unwrap();
        engine.tick(1000).unwrap();
        engine.increase_time(1).unwrap();
        assert!(engine.is_running());
        assert_eq!(engine.remaining_ms(), 1_559_000);
        assert_eq!(engine.rounds(), 2);
        assert_eq!(engine.accumulated_ms(), 1000);
        assert_eq!(ticker.active(), 1);
        assert!(repo.records().is_empty());
    }

    #[test]
    fn decrease_by_26_minutes_while_idle_resets() {
        let (mut engine, _, _) = engine();
        engine.decrease_time(26).unwrap();
        assert!(!engine.is_running());
        assert_eq!(engine.remaining_ms(), 1_500_000);
    }

    #[test]
    fn decrease_by_26_minutes_while_running_leaves_negative() {
        let (mut engine, ticker, repo) = engine();
        engine.start().unwrap();
        engine.decrease_time(26).unwrap();
        assert!(!engine.is_running());
        assert_eq!(engine.remaining_ms(), -60_000);
        assert_eq!(engine.rounds(), 2);
        assert_eq!(ticker.active(), 0);
        assert_eq!(repo.records().len(), 1);
    }

    #[test]
    fn load_today_seeds_rounds_and_total() {
        let (mut engine, _, repo) = engine();
        let store = DailyAggregateStore::new(repo);
        store.save("01-01-2024", 1000).unwrap();
        store.save("01-01-2024", 2000).unwrap();
        store.save("02-01-2024", 9000).unwrap();

        let aggregate = engine.load_today().unwrap();
        assert_eq!(aggregate.total_ms, 3000);
        assert_eq!(engine.rounds(), 2);
        assert_eq!(engine.today_ms(), 3000);
    }

    #[test]
    fn start_after_finish_completes_without_ticking() {
        let (mut engine, ticker, repo) = engine();
        engine.change_type(TimerType::ShortBreak).unwrap();
        engine.start().unwrap();
        for _ in 0..300 {
            engine.tick(1000).unwrap();
        }
        assert_eq!(engine.remaining_ms(), 0);
        assert_eq!(repo.records().len(), 2);

        let event = engine.start().unwrap();
        assert!(matches!(event, Event::TimerCompleted { saved_ms: 0, .. }));
        assert!(!engine.is_running());
        assert_eq!(ticker.active(), 0);
        assert_eq!(ticker.scheduled(), 1);
        assert!(engine.tick(1000).unwrap().is_none());
        assert_eq!(engine.remaining_ms(), 0);

        let store = DailyAggregateStore::new(repo);
        let aggregate = store.retrieve_by_date("01-01-2024").unwrap();
        assert_eq!(aggregate.total_ms, 300_000);
        assert_eq!(aggregate.round_count, 3);
    }

    #[test]
    fn decrease_to_exactly_zero_while_running_finishes() {
        let (mut engine, ticker, repo) = engine();
        engine.change_type(TimerType::ShortBreak).unwrap();
        engine.start().unwrap();
        engine.tick(1000).unwrap();
        engine.increase_time(1).unwrap();
        // 299s + 60s left; drop to 59s, then to -1s
        engine.decrease_time(5).unwrap();
        assert!(engine.is_running());
        assert_eq!(engine.remaining_ms(), 59_000);

        let event = engine.decrease_time(1).unwrap();
        assert!(matches!(event, Event::TimeAdjusted { is_running: false, .. }));
        assert_eq!(engine.remaining_ms(), -1_000);
        assert_eq!(ticker.active(), 0);
        assert_eq!(repo.records().len(), 2);
        assert_eq!(repo.records()[1].contributed_ms, 1000);
    }

    #[test]
    fn load_today_failure_leaves_state_alone() {
        let repo = Arc::new(MemoryRepository::failing());
        let mut engine = TimerEngine::new(DailyAggregateStore::new(repo), Box::new(ManualTicker::new()))
            .with_today(fixed_day);
        engine.start().unwrap();
        engine.tick(1000).unwrap();

        let err = engine.load_today().unwrap_err();
        assert!(matches!(
            err,
            crate::error::CoreError::Database(crate::error::DatabaseError::ReadFailed { .. })
        ));
        assert_eq!(engine.rounds(), 1);
        assert_eq!(engine.today_ms(), 1000);
        assert!(engine.is_running());
    }

    #[test]
    fn failed_save_still_stops_the_timer() {
        let repo = Arc::new(MemoryRepository::failing());
        let mut engine = TimerEngine::new(DailyAggregateStore::new(repo), Box::new(ManualTicker::new()))
            .with_today(fixed_day);
        engine.start().unwrap();
        engine.tick(1000).unwrap();
        assert!(engine.cancel(false).is_err());
        assert!(!engine.is_running());
        assert_eq!(engine.accumulated_ms(), 0);
    }
}
