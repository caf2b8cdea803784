//! Standalone planner tasks.
//!
//! Planner tasks are scheduled for a day and belong either to a daily-win
//! category or to an attribute. Per `(category, day)` there may be at most
//! one pending or completed daily-win task, and a capped number of
//! attribute tasks.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::daily_wins::DailyWinCategory;
use crate::quest::{Difficulty, QuotaSlot};
use crate::user::StatKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum TaskCategory {
    DailyWin(DailyWinCategory),
    Attribute(StatKind),
}

impl TaskCategory {
    pub fn quota_slot(&self) -> QuotaSlot {
        match self {
            TaskCategory::DailyWin(c) => QuotaSlot::DailyWin(*c),
            TaskCategory::Attribute(s) => QuotaSlot::Attribute(*s),
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskCategory::DailyWin(c) => write!(f, "win:{c}"),
            TaskCategory::Attribute(s) => write!(f, "stat:{s}"),
        }
    }
}

/// Accepts `mental`, `win:mental`, `social` or `stat:social`.
impl std::str::FromStr for TaskCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("win:") {
            return rest.parse().map(TaskCategory::DailyWin);
        }
        if let Some(rest) = s.strip_prefix("stat:") {
            return rest.parse().map(TaskCategory::Attribute);
        }
        // "physical" is both; the daily win reading takes precedence
        s.parse::<DailyWinCategory>()
            .map(TaskCategory::DailyWin)
            .or_else(|_| s.parse::<StatKind>().map(TaskCategory::Attribute))
            .map_err(|_| format!("unknown task category '{s}'"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerTask {
    pub id: String,
    pub title: String,
    pub category: TaskCategory,
    pub difficulty: Difficulty,
    /// Derived from difficulty at creation
    pub exp_reward: u64,
    pub scheduled_for: NaiveDate,
    pub deadline: Option<DateTime<Utc>>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub missed: bool,
    pub created_at: DateTime<Utc>,
}

impl PlannerTask {
    pub fn is_pending(&self) -> bool {
        !self.completed && !self.missed
    }

    pub fn is_sweepable(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.deadline.is_some_and(|d| d < now)
    }
}

/// Parameters for a new planner task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub category: TaskCategory,
    pub difficulty: Difficulty,
    /// Defaults to today
    pub scheduled_for: Option<NaiveDate>,
    pub deadline: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, category: TaskCategory, difficulty: Difficulty) -> Self {
        Self {
            title: title.into(),
            category,
            difficulty,
            scheduled_for: None,
            deadline: None,
        }
    }

    pub(crate) fn into_task(self, id: String, day: NaiveDate, now: DateTime<Utc>) -> PlannerTask {
        PlannerTask {
            id,
            title: self.title,
            category: self.category,
            exp_reward: self.difficulty.exp_reward(),
            difficulty: self.difficulty,
            scheduled_for: day,
            deadline: self.deadline,
            completed: false,
            completed_at: None,
            missed: false,
            created_at: now,
        }
    }
}

/// Whether one more task fits in `(category, day)`.
pub fn has_capacity(
    tasks: &[PlannerTask],
    category: TaskCategory,
    day: NaiveDate,
    attribute_cap: usize,
) -> bool {
    let mut same_slot = tasks
        .iter()
        .filter(|t| t.category == category && t.scheduled_for == day);
    match category {
        TaskCategory::DailyWin(_) => !same_slot.any(|t| !t.missed),
        TaskCategory::Attribute(_) => same_slot.count() < attribute_cap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn task(category: TaskCategory) -> PlannerTask {
        NewTask::new("t", category, Difficulty::Easy).into_task("id".into(), day(), Utc::now())
    }

    #[test]
    fn exp_derived_from_difficulty() {
        let t = NewTask::new("Run", TaskCategory::Attribute(StatKind::Physical), Difficulty::Boss)
            .into_task("x".into(), day(), Utc::now());
        assert_eq!(t.exp_reward, 100);
    }

    #[test]
    fn one_daily_win_task_per_day_unless_missed() {
        let cat = TaskCategory::DailyWin(DailyWinCategory::Mental);
        let mut tasks = vec![task(cat)];
        assert!(!has_capacity(&tasks, cat, day(), 5));

        tasks[0].missed = true;
        assert!(has_capacity(&tasks, cat, day(), 5));

        let other_day = day().succ_opt().unwrap();
        tasks[0].missed = false;
        assert!(has_capacity(&tasks, cat, other_day, 5));
    }

    #[test]
    fn attribute_tasks_capped() {
        let cat = TaskCategory::Attribute(StatKind::Social);
        let tasks: Vec<_> = (0..5).map(|_| task(cat)).collect();
        assert!(!has_capacity(&tasks, cat, day(), 5));
        assert!(has_capacity(&tasks[..4], cat, day(), 5));
    }

    #[test]
    fn category_parsing() {
        assert_eq!(
            "physical".parse::<TaskCategory>(),
            Ok(TaskCategory::DailyWin(DailyWinCategory::Physical))
        );
        assert_eq!(
            "stat:physical".parse::<TaskCategory>(),
            Ok(TaskCategory::Attribute(StatKind::Physical))
        );
        assert_eq!(
            "social".parse::<TaskCategory>(),
            Ok(TaskCategory::Attribute(StatKind::Social))
        );
        assert!("win:social".parse::<TaskCategory>().is_err());
    }
}
