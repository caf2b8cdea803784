use chrono::{DateTime, NaiveDate, Utc};
use clap::Subcommand;
use questlog_core::{Difficulty, NewTask, TaskCategory};
use serde_json::json;

use super::{print_json, with_engine, CliResult};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Schedule a planner task
    Add {
        title: String,
        /// "win:<mental|physical|spiritual|intelligence>" or "stat:<physical|cognitive|emotional|spiritual|social>"
        #[arg(long)]
        category: TaskCategory,
        /// easy, normal, medium, hard or boss
        #[arg(long, default_value = "normal")]
        difficulty: Difficulty,
        /// Day the task is planned for (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// RFC 3339 deadline
        #[arg(long)]
        deadline: Option<DateTime<Utc>>,
    },
    /// Complete a planner task
    Complete { id: String },
    /// Delete a planner task
    Delete { id: String },
    /// List planner tasks
    List {
        /// Only tasks scheduled for this day
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Only pending tasks
        #[arg(long)]
        pending: bool,
    },
}

pub fn run(action: TaskAction) -> CliResult {
    with_engine(|engine| match action {
        TaskAction::Add {
            title,
            category,
            difficulty,
            date,
            deadline,
        } => {
            let mut new = NewTask::new(title, category, difficulty);
            new.scheduled_for = date;
            new.deadline = deadline;
            let task = engine.add_task(new)?;
            print_json(&task)
        }
        TaskAction::Complete { id } => {
            let completion = engine.complete_task(&id)?;
            print_json(&completion)
        }
        TaskAction::Delete { id } => {
            let removed = engine.delete_task(&id)?;
            print_json(&json!({ "deleted": removed.id }))
        }
        TaskAction::List { date, pending } => {
            let tasks: Vec<_> = engine
                .tasks()
                .iter()
                .filter(|t| date.map_or(true, |d| t.scheduled_for == d))
                .filter(|t| !pending || t.is_pending())
                .collect();
            print_json(&tasks)
        }
    })
}
