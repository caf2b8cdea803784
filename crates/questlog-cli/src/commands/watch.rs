//! Foreground scheduler loop.
//!
//! Drives [`GameEngine::tick`](questlog_core::GameEngine::tick) from a tokio
//! interval until Ctrl-C, printing one JSON line per tick that did anything.

use std::time::Duration;

use tracing::{debug, info};

use super::{open_engine, record_events, CliResult};

pub fn run(interval_secs: u64, ticks: Option<u64>) -> CliResult {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(watch(Duration::from_secs(interval_secs.max(1)), ticks))
}

async fn watch(period: Duration, ticks: Option<u64>) -> CliResult {
    let mut engine = open_engine()?;
    record_events(&mut engine)?;
    let mut interval = tokio::time::interval(period);
    let mut count = 0u64;

    info!(period_secs = period.as_secs(), "watching for boundaries");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal");
                break;
            }
            _ = interval.tick() => {
                let report = engine.tick();
                if report.plan.is_idle() {
                    debug!("tick idle");
                } else {
                    println!("{}", serde_json::to_string(&report)?);
                }
                record_events(&mut engine)?;

                count += 1;
                if ticks.is_some_and(|limit| count >= limit) {
                    break;
                }
            }
        }
    }
    Ok(())
}
