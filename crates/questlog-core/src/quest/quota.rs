//! Daily quota accounting.
//!
//! At most one main quest and one side quest may be started and completed
//! per local day. A slot is busy while another quest of that slot is in
//! progress, or once one was started or completed today.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Quest;
use crate::clock::DayBoundary;
use crate::daily_wins::DailyWinCategory;
use crate::user::StatKind;

/// A rate-limited resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "slot", content = "category", rename_all = "snake_case")]
pub enum QuotaSlot {
    Main,
    Side,
    /// One pending or completed planner task per category per day
    DailyWin(DailyWinCategory),
    /// Capped number of planner tasks per attribute per day
    Attribute(StatKind),
}

impl fmt::Display for QuotaSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaSlot::Main => f.write_str("main quest"),
            QuotaSlot::Side => f.write_str("side quest"),
            QuotaSlot::DailyWin(c) => write!(f, "daily win '{c}'"),
            QuotaSlot::Attribute(s) => write!(f, "attribute '{s}'"),
        }
    }
}

/// How a quest slot has been used today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotUsage {
    pub in_progress: bool,
    pub started_today: bool,
    pub completed_today: bool,
}

impl SlotUsage {
    /// Usage of `slot` by every quest except `exclude`.
    pub fn of(
        quests: &[Quest],
        slot: QuotaSlot,
        today: NaiveDate,
        boundary: &DayBoundary,
        exclude: Option<&str>,
    ) -> Self {
        quests
            .iter()
            .filter(|q| q.kind.quota_slot() == Some(slot))
            .filter(|q| exclude != Some(q.id.as_str()))
            .fold(SlotUsage::default(), |acc, q| SlotUsage {
                in_progress: acc.in_progress || q.in_progress(),
                started_today: acc.started_today || q.started_on(today, boundary),
                completed_today: acc.completed_today || q.completed_on(today, boundary),
            })
    }

    pub fn allows_start(&self) -> bool {
        !(self.in_progress || self.started_today || self.completed_today)
    }

    pub fn allows_completion(&self) -> bool {
        !self.completed_today
    }
}

/// Today's quest progress, as shown on a dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyQuestStatus {
    pub day: NaiveDate,
    pub main: SlotUsage,
    pub side: SlotUsage,
    pub dailies_completed: usize,
    pub dailies_total: usize,
    pub all_dailies_completed: bool,
}

impl DailyQuestStatus {
    pub fn compute(quests: &[Quest], today: NaiveDate, boundary: &DayBoundary) -> Self {
        let dailies: Vec<&Quest> = quests
            .iter()
            .filter(|q| matches!(q.kind, super::QuestKind::Daily { day } if day == today))
            .collect();
        let dailies_completed = dailies.iter().filter(|q| q.is_completed()).count();
        Self {
            day: today,
            main: SlotUsage::of(quests, QuotaSlot::Main, today, boundary, None),
            side: SlotUsage::of(quests, QuotaSlot::Side, today, boundary, None),
            dailies_completed,
            dailies_total: dailies.len(),
            all_dailies_completed: !dailies.is_empty() && dailies_completed == dailies.len(),
        }
    }
}
