use clap::Subcommand;
use focustimer_core::timer::{format_countdown, format_duration};
use focustimer_core::{Config, Event, TimerService, TimerSnapshot, TimerType};
use serde::Serialize;

use super::open_store;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run a countdown in the foreground (Ctrl-C cancels and saves)
    Run {
        /// focus, short-break or long-break (defaults to timer.default_type)
        #[arg(long = "type")]
        timer_type: Option<TimerType>,
        /// Adjust steps to add before starting
        #[arg(long, default_value = "0")]
        plus: u32,
        /// Adjust steps to remove before starting
        #[arg(long, default_value = "0")]
        minus: u32,
        /// Print every state change as JSON
        #[arg(long)]
        json: bool,
    },
    /// List timer types and their nominal durations
    Types,
}

#[derive(Serialize)]
struct TypeInfo {
    key: &'static str,
    title: &'static str,
    duration_min: u64,
    duration_ms: u64,
}

pub async fn run(action: TimerAction, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TimerAction::Types => {
            let types: Vec<TypeInfo> = TimerType::all()
                .iter()
                .map(|t| TypeInfo {
                    key: t.key(),
                    title: t.title(),
                    duration_min: t.duration_min(),
                    duration_ms: t.duration_ms(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&types)?);
        }
        TimerAction::Run {
            timer_type,
            plus,
            minus,
            json,
        } => {
            let timer_type = timer_type.unwrap_or(config.timer.default_type);
            let step = config.timer.adjust_step_min;
            run_countdown(
                config,
                timer_type,
                step_minutes(plus, step),
                step_minutes(minus, step),
                json,
            )
            .await?;
        }
    }
    Ok(())
}

/// Minutes covered by `steps` adjust steps, capped at `u32::MAX`.
fn step_minutes(steps: u32, step_min: u32) -> u32 {
    steps.saturating_mul(step_min)
}

async fn run_countdown(
    config: &Config,
    timer_type: TimerType,
    plus_min: u32,
    minus_min: u32,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config)?;
    let (handle, task) = TimerService::spawn(store, timer_type);

    handle.load_today().await?;
    if plus_min > 0 {
        handle.increase_time(plus_min).await?;
    }
    if minus_min > 0 {
        handle.decrease_time(minus_min).await?;
    }
    print_event(&handle.start().await?)?;

    let mut updates = handle.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                print_progress(&snapshot, json)?;
                if !snapshot.is_running {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                tracing::info!("interrupted, saving session");
                print_event(&handle.cancel(false).await?)?;
                break;
            }
        }
    }

    print_event(&handle.load_today().await?)?;
    handle.shutdown().await?;
    task.await?;
    Ok(())
}

fn print_event(event: &Event) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

fn print_progress(snapshot: &TimerSnapshot, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
    } else {
        println!(
            "{} {}  round {}  today {}",
            snapshot.timer_type.title(),
            format_countdown(snapshot.remaining_ms),
            snapshot.rounds,
            format_duration(snapshot.today_ms),
        );
    }
    Ok(())
}
