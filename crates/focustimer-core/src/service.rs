//! Async driver for [`TimerEngine`].
//!
//! One tokio task owns the engine. Commands arrive over an mpsc channel and
//! are answered through a oneshot; ticks arrive from an [`IntervalTicker`].
//! Both are handled in the same `select!` loop, so engine mutations never
//! overlap. After every change the task publishes a [`TimerSnapshot`] on a
//! `watch` channel for subscribers.
//!
//! Saves run inline on this task. A slow store holds up tick handling for
//! the duration of the insert; ticks queue on the unbounded channel
//! meanwhile and are applied in order once the save returns, so none are
//! lost. A failed save is logged and the loop carries on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::storage::DailyAggregateStore;
use crate::timer::{IntervalTicker, Tick, TimerEngine, TimerSnapshot, TimerType};

const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Cancel { reset: bool },
    ChangeType(TimerType),
    IncreaseTime(u32),
    DecreaseTime(u32),
    LoadToday,
    Snapshot,
    /// Save whatever a running timer has accumulated and stop the task.
    Shutdown,
}

type Request = (Command, oneshot::Sender<Result<Event>>);

/// Cloneable client for a running [`TimerService`].
#[derive(Clone)]
pub struct TimerHandle {
    commands: mpsc::Sender<Request>,
    snapshots: watch::Receiver<TimerSnapshot>,
}

impl TimerHandle {
    async fn send(&self, command: Command) -> Result<Event> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send((command, reply_tx))
            .await
            .map_err(|_| CoreError::ServiceStopped)?;
        reply_rx.await.map_err(|_| CoreError::ServiceStopped)?
    }

    pub async fn start(&self) -> Result<Event> {
        self.send(Command::Start).await
    }

    pub async fn cancel(&self, reset: bool) -> Result<Event> {
        self.send(Command::Cancel { reset }).await
    }

    pub async fn change_type(&self, timer_type: TimerType) -> Result<Event> {
        self.send(Command::ChangeType(timer_type)).await
    }

    pub async fn increase_time(&self, minutes: u32) -> Result<Event> {
        self.send(Command::IncreaseTime(minutes)).await
    }

    pub async fn decrease_time(&self, minutes: u32) -> Result<Event> {
        self.send(Command::DecreaseTime(minutes)).await
    }

    pub async fn load_today(&self) -> Result<Event> {
        self.send(Command::LoadToday).await
    }

    pub async fn shutdown(&self) -> Result<Event> {
        self.send(Command::Shutdown).await
    }

    /// Latest published state, without a round trip.
    pub fn snapshot(&self) -> TimerSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that sees every published state change.
    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.snapshots.clone()
    }
}

pub struct TimerService {
    engine: TimerEngine,
    commands: mpsc::Receiver<Request>,
    ticks: mpsc::UnboundedReceiver<Tick>,
    generation: Arc<AtomicU64>,
    snapshots: watch::Sender<TimerSnapshot>,
}

impl TimerService {
    /// Spawn a service for an idle timer of `initial_type`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(store: DailyAggregateStore, initial_type: TimerType) -> (TimerHandle, JoinHandle<()>) {
        let (ticker, ticks) = IntervalTicker::new();
        let generation = ticker.generation();
        let engine = TimerEngine::new(store, Box::new(ticker)).with_initial_type(initial_type);

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(engine.snapshot());

        let service = Self {
            engine,
            commands: command_rx,
            ticks,
            generation,
            snapshots: snapshot_tx,
        };
        let task = tokio::spawn(service.run());
        (
            TimerHandle {
                commands: command_tx,
                snapshots: snapshot_rx,
            },
            task,
        )
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                request = self.commands.recv() => {
                    let Some((command, reply)) = request else {
                        // Every handle is gone.
                        self.flush_running();
                        break;
                    };
                    let result = self.apply(command);
                    if let Err(err) = &result {
                        tracing::warn!(?command, error = %err, "timer command failed");
                    }
                    let _ = reply.send(result);
                    self.publish();
                    if command == Command::Shutdown {
                        break;
                    }
                }
                Some(tick) = self.ticks.recv() => {
                    self.on_tick(tick);
                    self.publish();
                }
            }
        }
        tracing::debug!("timer service stopped");
    }

    fn apply(&mut self, command: Command) -> Result<Event> {
        match command {
            Command::Start => self.engine.start(),
            Command::Cancel { reset } => self.engine.cancel(reset),
            Command::ChangeType(timer_type) => self.engine.change_type(timer_type),
            Command::IncreaseTime(minutes) => self.engine.increase_time(minutes),
            Command::DecreaseTime(minutes) => self.engine.decrease_time(minutes),
            Command::LoadToday => self.engine.load_today().map(|aggregate| Event::TodayLoaded {
                aggregate,
                at: chrono::Utc::now(),
            }),
            Command::Snapshot => Ok(self.engine.snapshot_event()),
            Command::Shutdown => {
                if self.engine.is_running() {
                    self.engine.cancel(false)
                } else {
                    Ok(self.engine.snapshot_event())
                }
            }
        }
    }

    /// Tick errors are logged, never propagated: the loop must keep going.
    fn on_tick(&mut self, tick: Tick) {
        if tick.generation != self.generation.load(Ordering::SeqCst) {
            tracing::trace!(generation = tick.generation, "dropping tick from cancelled schedule");
            return;
        }
        match self.engine.tick(tick.elapsed_ms) {
            Ok(Some(event)) => tracing::info!(?event, "countdown finished"),
            Ok(None) => {}
            Err(err) => tracing::warn!(error = %err, "failed to record finished session"),
        }
    }

    fn flush_running(&mut self) {
        if self.engine.is_running() {
            if let Err(err) = self.engine.cancel(false) {
                tracing::warn!(error = %err, "failed to save session on shutdown");
            }
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.engine.snapshot());
    }
}
