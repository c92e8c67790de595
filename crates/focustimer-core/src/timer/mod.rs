mod accumulator;
mod catalog;
mod engine;
mod format;
mod ticker;

pub use accumulator::SessionAccumulator;
pub use catalog::{TimerType, ONE_MIN_MS, ONE_SEC_MS};
pub use engine::{TimerEngine, TimerSnapshot};
pub use format::{format_countdown, format_duration};
pub use ticker::{IntervalTicker, ManualTicker, Tick, TickHandle, TickSource, TICK_PERIOD};
