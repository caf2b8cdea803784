use serde_json::json;

use super::{print_json, with_engine, CliResult};

pub fn run_tick() -> CliResult {
    with_engine(|engine| {
        let report = engine.tick();
        print_json(&report)
    })
}

pub fn run_curse() -> CliResult {
    with_engine(|engine| {
        let report = engine.check_curse_status();
        print_json(&json!({
            "report": report,
            "penalty": engine.penalty(),
            "exp_multiplier": engine.exp_multiplier(),
            "can_use_redemption": engine.can_use_redemption(),
        }))
    })
}
