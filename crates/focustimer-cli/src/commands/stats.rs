use chrono::{Local, NaiveDate};
use clap::Subcommand;
use focustimer_core::storage::date_key;
use focustimer_core::timer::format_duration;
use focustimer_core::{Config, DailyAggregate};
use serde::Serialize;

use super::open_store;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's totals
    Today,
    /// Totals for a day key (dd-mm-yyyy)
    Date {
        /// Day key; shorter strings match by substring
        date: String,
    },
}

#[derive(Serialize)]
struct StatsOutput {
    #[serde(flatten)]
    aggregate: DailyAggregate,
    total: String,
}

pub fn run(action: StatsAction, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let date = match action {
        StatsAction::Today => date_key(Local::now().date_naive()),
        StatsAction::Date { date } => {
            if NaiveDate::parse_from_str(&date, "%d-%m-%Y").is_err() {
                tracing::warn!(%date, "not a full dd-mm-yyyy key, matching by substring");
            }
            date
        }
    };

    let store = open_store(config)?;
    let aggregate = store.retrieve_by_date(&date)?;
    let output = StatsOutput {
        total: format_duration(aggregate.total_ms),
        aggregate,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
