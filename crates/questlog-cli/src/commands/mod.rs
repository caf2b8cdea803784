pub mod config;
pub mod history;
pub mod quest;
pub mod task;
pub mod tick;
pub mod user;
pub mod watch;

use std::sync::Arc;

use questlog_core::{Database, GameEngine, RulesConfig, SystemClock};
use serde::Serialize;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Load the engine from the data directory. Loading runs one tick.
pub fn open_engine() -> Result<GameEngine<Database>, Box<dyn std::error::Error>> {
    let config = RulesConfig::load_or_default();
    let db = Database::open()?;
    Ok(GameEngine::load(Arc::new(SystemClock), db, config)?)
}

/// Append pending engine events to the history table.
pub fn record_events(engine: &mut GameEngine<Database>) -> CliResult {
    let events = engine.drain_events();
    let now = engine.now();
    engine.store().append_events(&events, now)?;
    if let Some(err) = engine.last_persist_error() {
        tracing::warn!(error = err, "state was not saved");
    }
    Ok(())
}

/// Open the engine, run `f`, and record events even if `f` fails.
pub fn with_engine<F>(f: F) -> CliResult
where
    F: FnOnce(&mut GameEngine<Database>) -> CliResult,
{
    let mut engine = open_engine()?;
    let result = f(&mut engine);
    record_events(&mut engine)?;
    result
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
