//! # Focus Timer Core Library
//!
//! Countdown engine for cyclical focus/break sessions plus the per-day
//! session log behind it. The `focustimer-cli` binary is a thin layer over
//! this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: single-countdown state machine. It schedules ticks
//!   through a [`TickSource`] and is fed them back through `tick()`
//! - **Session Accumulator**: time elapsed since the last save
//! - **Daily Aggregate Store**: append-only session log with per-day sums,
//!   backed by SQLite or memory
//! - **Timer Service**: tokio task that owns an engine and serializes every
//!   mutation
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`DailyAggregateStore`]: Session persistence and daily totals
//! - [`TimerService`]: Async driver with snapshot subscriptions
//! - [`Config`]: Application configuration management

pub mod error;
pub mod events;
pub mod service;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::Event;
pub use service::{TimerHandle, TimerService};
pub use storage::{Config, DailyAggregate, DailyAggregateStore, Database, MemoryRepository};
pub use timer::{TickSource, TimerEngine, TimerSnapshot, TimerType};
