use chrono::{DateTime, Utc};
use clap::Subcommand;
use questlog_core::{Difficulty, NewQuest, NewQuestKind, NewQuestTask, TaskCategory};
use serde_json::json;

use super::{print_json, with_engine, CliResult};

#[derive(Subcommand)]
pub enum QuestAction {
    /// Add a quest
    Add {
        /// Quest title
        title: String,
        /// Quest kind: main, side or daily
        #[arg(long, default_value = "side")]
        kind: NewQuestKind,
        /// EXP granted on completion
        #[arg(long, default_value = "50")]
        exp: u64,
        #[arg(long, default_value = "")]
        description: String,
        /// RFC 3339 deadline (ignored for daily quests)
        #[arg(long)]
        deadline: Option<DateTime<Utc>>,
        #[arg(long, default_value = "normal")]
        difficulty: Difficulty,
        /// Daily win or attribute credited on completion (e.g. "win:mental", "stat:social")
        #[arg(long)]
        category: Option<TaskCategory>,
    },
    /// Start a quest
    Start { id: String },
    /// Add a subtask to a quest
    TaskAdd {
        quest_id: String,
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        category: Option<TaskCategory>,
        #[arg(long, default_value = "normal")]
        difficulty: Difficulty,
        #[arg(long)]
        deadline: Option<DateTime<Utc>>,
    },
    /// Mark a subtask done
    TaskDone { quest_id: String, task_id: String },
    /// Complete a quest and collect the reward
    Complete { id: String },
    /// Delete a quest
    Delete { id: String },
    /// List quests
    List {
        /// Only quests that are not completed or missed
        #[arg(long)]
        open: bool,
    },
    /// Today's main/side quota and daily quest progress
    Quota,
}

pub fn run(action: QuestAction) -> CliResult {
    with_engine(|engine| match action {
        QuestAction::Add {
            title,
            kind,
            exp,
            description,
            deadline,
            difficulty,
            category,
        } => {
            let mut new = NewQuest::new(title, kind, exp).with_description(description);
            new.deadline = deadline;
            new.difficulty = difficulty;
            new.category = category;
            let quest = engine.add_quest(new)?;
            print_json(&quest)
        }
        QuestAction::Start { id } => {
            engine.start_quest(&id)?;
            print_json(&engine.quest(&id))
        }
        QuestAction::TaskAdd {
            quest_id,
            title,
            description,
            category,
            difficulty,
            deadline,
        } => {
            let new = NewQuestTask {
                title,
                description,
                category,
                difficulty,
                deadline,
            };
            let task = engine.add_quest_task(&quest_id, new)?;
            print_json(&task)
        }
        QuestAction::TaskDone { quest_id, task_id } => {
            engine.complete_quest_task(&quest_id, &task_id)?;
            print_json(&json!({
                "quest_id": quest_id,
                "task_id": task_id,
                "can_complete": engine.can_complete_quest(&quest_id),
            }))
        }
        QuestAction::Complete { id } => {
            let completion = engine.complete_quest(&id)?;
            print_json(&completion)
        }
        QuestAction::Delete { id } => {
            let removed = engine.delete_quest(&id)?;
            print_json(&json!({ "deleted": removed.id }))
        }
        QuestAction::List { open } => {
            let quests: Vec<_> = engine
                .quests()
                .iter()
                .filter(|q| !open || q.is_open())
                .collect();
            print_json(&quests)
        }
        QuestAction::Quota => print_json(&engine.get_daily_quest_completion_status()),
    })
}
