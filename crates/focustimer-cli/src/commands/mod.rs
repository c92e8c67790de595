pub mod config;
pub mod stats;
pub mod timer;

use std::sync::Arc;

use focustimer_core::{Config, DailyAggregateStore, Database};

/// Open the configured session database.
pub fn open_store(config: &Config) -> Result<DailyAggregateStore, Box<dyn std::error::Error>> {
    let db = Database::open_at(&config.database_path()?)?;
    Ok(DailyAggregateStore::new(Arc::new(db)))
}
