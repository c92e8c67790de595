//! Periodic tick sources.
//!
//! The engine never sleeps or spawns by itself. It asks a [`TickSource`] to
//! schedule a repeating callback and keeps the returned [`TickHandle`] so
//! the schedule can be cancelled. Ticks are delivered back to the engine by
//! whoever owns it (see [`crate::service`]).

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Fixed tick period.
pub const TICK_PERIOD: Duration = Duration::from_millis(1_000);

/// A cancellable repeating schedule.
pub trait TickHandle: Send {
    /// Stop the schedule. Calling it more than once is harmless.
    fn cancel(&mut self);
}

/// Something that can schedule a repeating tick.
pub trait TickSource: Send {
    fn schedule(&mut self, period: Duration) -> Box<dyn TickHandle>;
}

/// A tick produced by [`IntervalTicker`], tagged with the schedule that
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub generation: u64,
    pub elapsed_ms: u64,
}

/// Tokio-backed tick source. Each schedule runs in its own task and sends
/// [`Tick`]s on an unbounded channel.
pub struct IntervalTicker {
    tx: mpsc::UnboundedSender<Tick>,
    generation: Arc<AtomicU64>,
}

impl IntervalTicker {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Tick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                generation: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Shared view of the current schedule generation. A tick whose
    /// generation differs was produced by a cancelled schedule.
    pub fn generation(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.generation)
    }
}

impl TickSource for IntervalTicker {
    fn schedule(&mut self, period: Duration) -> Box<dyn TickHandle> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let tx = self.tx.clone();
        let elapsed_ms = period.as_millis() as u64;
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(Tick { generation, elapsed_ms }).is_err() {
                    break;
                }
            }
        });
        tracing::trace!(generation, "tick schedule started");
        Box::new(IntervalHandle { task: Some(task) })
    }
}

struct IntervalHandle {
    task: Option<JoinHandle<()>>,
}

impl TickHandle for IntervalHandle {
    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for IntervalHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Tick source for driving the engine by hand. Counts how many schedules
/// were created and how many are still live.
#[derive(Clone, Default)]
pub struct ManualTicker {
    scheduled: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total schedules ever created.
    pub fn scheduled(&self) -> usize {
        self.scheduled.load(Ordering::SeqCst)
    }

    /// Schedules not yet cancelled.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl TickSource for ManualTicker {
    fn schedule(&mut self, _period: Duration) -> Box<dyn TickHandle> {
        self.scheduled.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
        Box::new(ManualHandle {
            active: Arc::clone(&self.active),
            cancelled: false,
        })
    }
}

struct ManualHandle {
    active: Arc<AtomicUsize>,
    cancelled: bool,
}

impl TickHandle for ManualHandle {
    fn cancel(&mut self) {
        if !self.cancelled {
            self.cancelled = true;
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
