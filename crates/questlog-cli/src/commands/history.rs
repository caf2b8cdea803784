use questlog_core::Database;

use super::{print_json, CliResult};

pub fn run(limit: usize, kind: Option<String>) -> CliResult {
    let db = Database::open()?;
    let entries = db.history(limit, kind.as_deref())?;
    print_json(&entries)
}
