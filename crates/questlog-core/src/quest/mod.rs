//! Quest types and lifecycle.
//!
//! Quests move through a small state machine:
//!
//! ```text
//! NotStarted ──start──> Started ──complete──> Completed
//!     │                    │
//!     └──── deadline ──────┴──────> Missed
//! ```
//!
//! `Completed` and `Missed` are terminal. Daily quests may go straight from
//! `NotStarted` to `Completed` on the day they were created.

pub mod quota;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clock::DayBoundary;
use crate::planner::TaskCategory;

pub use quota::{DailyQuestStatus, QuotaSlot, SlotUsage};

/// Difficulty tier shared by quests and planner tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Medium,
    Hard,
    Boss,
}

impl Difficulty {
    pub const ALL: [Difficulty; 5] = [
        Difficulty::Easy,
        Difficulty::Normal,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Boss,
    ];

    /// EXP granted by a planner task of this difficulty.
    pub fn exp_reward(&self) -> u64 {
        match self {
            Difficulty::Easy => 10,
            Difficulty::Normal => 15,
            Difficulty::Medium => 25,
            Difficulty::Hard => 50,
            Difficulty::Boss => 100,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Boss => "boss",
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Difficulty::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown difficulty '{s}'"))
    }
}

/// Primary kind of a quest. Exactly one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestKind {
    Main,
    Side,
    /// Valid only on `day`; deadline is the end of that day
    Daily { day: NaiveDate },
    /// Spawned by the penalty engine to redeem a curse
    Recovery { spawned_at: DateTime<Utc> },
}

impl QuestKind {
    /// Daily quests are unlimited; recovery quests share the side slot.
    pub fn quota_slot(&self) -> Option<QuotaSlot> {
        match self {
            QuestKind::Main => Some(QuotaSlot::Main),
            QuestKind::Side | QuestKind::Recovery { .. } => Some(QuotaSlot::Side),
            QuestKind::Daily { .. } => None,
        }
    }

    pub fn is_daily(&self) -> bool {
        matches!(self, QuestKind::Daily { .. })
    }

    pub fn is_recovery(&self) -> bool {
        matches!(self, QuestKind::Recovery { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            QuestKind::Main => "main",
            QuestKind::Side => "side",
            QuestKind::Daily { .. } => "daily",
            QuestKind::Recovery { .. } => "recovery",
        }
    }
}

impl fmt::Display for QuestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kinds a user may create directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewQuestKind {
    Main,
    Side,
    Daily,
}

impl std::str::FromStr for NewQuestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "main" => Ok(NewQuestKind::Main),
            "side" => Ok(NewQuestKind::Side),
            "daily" => Ok(NewQuestKind::Daily),
            other => Err(format!("unknown quest kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestState {
    #[default]
    NotStarted,
    Started,
    Completed,
    Missed,
}

impl QuestState {
    pub fn can_transition_to(&self, to: &QuestState) -> bool {
        match self {
            QuestState::NotStarted => matches!(to, QuestState::Started | QuestState::Missed),
            QuestState::Started => matches!(to, QuestState::Completed | QuestState::Missed),
            QuestState::Completed | QuestState::Missed => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QuestState::Completed | QuestState::Missed)
    }
}

/// A subtask of a quest. Rewards are only granted when the quest completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestTask {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Option<TaskCategory>,
    pub difficulty: Difficulty,
    /// Informational; the quest deadline governs missing
    pub deadline: Option<DateTime<Utc>>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quest {
    pub id: String,
    pub title: String,
    pub description: String,
    pub kind: QuestKind,
    pub exp_reward: u64,
    pub difficulty: Difficulty,
    pub category: Option<TaskCategory>,
    pub tasks: Vec<QuestTask>,
    pub deadline: Option<DateTime<Utc>>,
    pub state: QuestState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub missed_at: Option<DateTime<Utc>>,
}

impl Quest {
    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.state == QuestState::Completed
    }

    pub fn is_missed(&self) -> bool {
        self.state == QuestState::Missed
    }

    pub fn in_progress(&self) -> bool {
        self.state == QuestState::Started
    }

    /// Not yet terminal.
    pub fn is_open(&self) -> bool {
        !self.state.is_terminal()
    }

    /// State graph for this quest. Dailies may also go straight from
    /// `NotStarted` to `Completed`.
    pub fn can_transition_to(&self, to: QuestState) -> bool {
        self.state.can_transition_to(&to)
            || (self.kind.is_daily()
                && self.state == QuestState::NotStarted
                && to == QuestState::Completed)
    }

    pub fn all_tasks_completed(&self) -> bool {
        self.tasks.iter().all(|t| t.completed)
    }

    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|d| d < now)
    }

    /// Whether the deadline sweep should mark this quest missed at `now`.
    pub fn is_sweepable(&self, now: DateTime<Utc>) -> bool {
        self.can_transition_to(QuestState::Missed)
            && self.deadline_passed(now)
            && (self.in_progress() || self.kind.is_daily())
    }

    pub fn task(&self, task_id: &str) -> Option<&QuestTask> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut QuestTask> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    pub fn started_on(&self, day: NaiveDate, boundary: &DayBoundary) -> bool {
        self.started_at.is_some_and(|t| boundary.day_of(t) == day)
    }

    pub fn completed_on(&self, day: NaiveDate, boundary: &DayBoundary) -> bool {
        self.completed_at.is_some_and(|t| boundary.day_of(t) == day)
    }

    pub(crate) fn mark_missed(&mut self, now: DateTime<Utc>) {
        self.state = QuestState::Missed;
        self.missed_at = Some(now);
    }
}

/// Parameters for a user-created quest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuest {
    pub title: String,
    pub description: String,
    pub kind: NewQuestKind,
    pub exp_reward: u64,
    /// Ignored for daily quests, which always end at 23:59:59 local
    pub deadline: Option<DateTime<Utc>>,
    pub difficulty: Difficulty,
    pub category: Option<TaskCategory>,
}

impl NewQuest {
    pub fn new(title: impl Into<String>, kind: NewQuestKind, exp_reward: u64) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            kind,
            exp_reward,
            deadline: None,
            difficulty: Difficulty::default(),
            category: None,
        }
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub(crate) fn into_quest(self, id: String, now: DateTime<Utc>, boundary: &DayBoundary) -> Quest {
        let (kind, deadline) = match self.kind {
            NewQuestKind::Main => (QuestKind::Main, self.deadline),
            NewQuestKind::Side => (QuestKind::Side, self.deadline),
            NewQuestKind::Daily => {
                let day = boundary.day_of(now);
                (QuestKind::Daily { day }, Some(boundary.end_of_day(day)))
            }
        };
        Quest {
            id,
            title: self.title,
            description: self.description,
            kind,
            exp_reward: self.exp_reward,
            difficulty: self.difficulty,
            category: self.category,
            tasks: Vec::new(),
            deadline,
            state: QuestState::NotStarted,
            created_at: now,
            started_at: None,
            completed_at: None,
            missed_at: None,
        }
    }
}

/// Parameters for a quest subtask.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewQuestTask {
    pub title: String,
    pub description: String,
    pub category: Option<TaskCategory>,
    pub difficulty: Difficulty,
    pub deadline: Option<DateTime<Utc>>,
}

impl NewQuestTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub(crate) fn into_task(self, id: String) -> QuestTask {
        QuestTask {
            id,
            title: self.title,
            description: self.description,
            category: self.category,
            difficulty: self.difficulty,
            deadline: self.deadline,
            completed: false,
            completed_at: None,
        }
    }
}
