//! Integration tests for the timer engine against the session store.

use std::sync::Arc;

use chrono::NaiveDate;
use focustimer_core::storage::{DailyAggregateStore, Database, MemoryRepository};
use focustimer_core::timer::{ManualTicker, TimerEngine, TimerType, ONE_MIN_MS};
use focustimer_core::Event;
use proptest::prelude::*;

fn new_year() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn memory_engine() -> (TimerEngine, ManualTicker) {
    let ticker = ManualTicker::new();
    let store = DailyAggregateStore::new(Arc::new(MemoryRepository::new()));
    let engine = TimerEngine::new(store, Box::new(ticker.clone())).with_today(new_year);
    (engine, ticker)
}

#[test]
fn test_full_focus_session_lands_in_daily_total() {
    let db = Database::open_memory().unwrap();
    let store = DailyAggregateStore::new(Arc::new(db));
    let mut engine =
        TimerEngine::new(store.clone(), Box::new(ManualTicker::new())).with_today(new_year);

    engine.start().unwrap();
    let mut finished = false;
    for _ in 0..1500 {
        if let Some(Event::TimerCompleted { saved_ms, .. }) = engine.tick(1000).unwrap() {
            assert_eq!(saved_ms, 1_500_000);
            finished = true;
        }
    }
    assert!(finished, "Focus countdown should finish after 25 minutes of ticks");
    assert!(!engine.is_running());

    let agg = store.retrieve_by_date("01-01-2024").unwrap();
    assert_eq!(agg.total_ms, 1_500_000);
    assert_eq!(agg.round_count, 1);
}

#[test]
fn test_ticks_after_finish_are_ignored() {
    let (mut engine, _) = memory_engine();
    engine.change_type(TimerType::ShortBreak).unwrap();
    engine.start().unwrap();
    for _ in 0..300 {
        engine.tick(1000).unwrap();
    }
    assert!(!engine.is_running());
    assert!(engine.tick(1000).unwrap().is_none());
    assert_eq!(engine.remaining_ms(), 0);

    // Starting a spent countdown finishes it again instead of ticking past zero.
    assert!(matches!(engine.start().unwrap(), Event::TimerCompleted { saved_ms: 0, .. }));
    assert!(engine.tick(1000).unwrap().is_none());
    assert_eq!(engine.remaining_ms(), 0);
    let agg = engine.store().retrieve_by_date(&engine.today_key()).unwrap();
    assert_eq!(agg.total_ms, 300_000);
    assert_eq!(agg.round_count, 3);
}

#[test]
fn test_at_most_one_schedule_is_live() {
    let (mut engine, ticker) = memory_engine();
    engine.start().unwrap();
    engine.start().unwrap();
    engine.increase_time(2).unwrap();
    engine.decrease_time(1).unwrap();
    assert_eq!(ticker.active(), 1);
    engine.cancel(true).unwrap();
    assert_eq!(ticker.active(), 0);
    assert_eq!(ticker.scheduled(), 4);
}

#[test]
fn test_day_totals_after_restart_and_cancel() {
    let (mut engine, _) = memory_engine();
    engine.start().unwrap();
    for _ in 0..10 {
        engine.tick(1000).unwrap();
    }
    engine.increase_time(1).unwrap();
    for _ in 0..5 {
        engine.tick(1000).unwrap();
    }
    engine.cancel(false).unwrap();

    let agg = engine.store().retrieve_by_date(&engine.today_key()).unwrap();
    assert_eq!(agg.total_ms, 15_000);
    assert_eq!(agg.round_count, 1);
    assert_eq!(engine.rounds(), 2);
}

proptest! {
    #[test]
    fn prop_increase_while_idle_adds_whole_minutes(n in 0u32..200) {
        let (mut engine, _) = memory_engine();
        let before = engine.remaining_ms();
        for _ in 0..n {
            engine.increase_time(1).unwrap();
        }
        prop_assert_eq!(engine.remaining_ms() - before, i64::from(n) * ONE_MIN_MS as i64);
        prop_assert!(!engine.is_running());
    }

    #[test]
    fn prop_change_type_always_resets(minutes in 0u32..120, target in 0usize..3) {
        let (mut engine, _) = memory_engine();
        engine.increase_time(minutes).unwrap();
        let timer_type = TimerType::ALL[target];
        engine.change_type(timer_type).unwrap();
        prop_assert_eq!(engine.remaining_ms(), timer_type.duration_ms() as i64);
    }
}
