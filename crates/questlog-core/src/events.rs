use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::daily_wins::{DailyWinCategory, StreakChange};
use crate::progression::Rank;
use crate::user::StatKind;

/// Every state change in the engine produces an Event.
/// Front ends poll for events; the CLI appends them to the history table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    QuestAdded {
        quest_id: String,
        kind: String,
        at: DateTime<Utc>,
    },
    QuestStarted {
        quest_id: String,
        at: DateTime<Utc>,
    },
    QuestTaskAdded {
        quest_id: String,
        task_id: String,
        at: DateTime<Utc>,
    },
    QuestTaskCompleted {
        quest_id: String,
        task_id: String,
        at: DateTime<Utc>,
    },
    QuestCompleted {
        quest_id: String,
        exp_gained: u64,
        gold_gained: u64,
        at: DateTime<Utc>,
    },
    QuestMissed {
        quest_id: String,
        at: DateTime<Utc>,
    },
    QuestDeleted {
        quest_id: String,
        at: DateTime<Utc>,
    },
    TaskAdded {
        task_id: String,
        at: DateTime<Utc>,
    },
    TaskCompleted {
        task_id: String,
        exp_gained: u64,
        at: DateTime<Utc>,
    },
    TaskMissed {
        task_id: String,
        at: DateTime<Utc>,
    },
    TaskDeleted {
        task_id: String,
        at: DateTime<Utc>,
    },
    ExpGained {
        raw: u64,
        effective: u64,
        at: DateTime<Utc>,
    },
    GoldGained {
        amount: u64,
        total: u64,
        at: DateTime<Utc>,
    },
    LevelUp {
        from: u32,
        to: u32,
        at: DateTime<Utc>,
    },
    RankChanged {
        from: Rank,
        to: Rank,
        at: DateTime<Utc>,
    },
    StatLevelUp {
        stat: StatKind,
        level: u32,
        at: DateTime<Utc>,
    },
    DailyWinCompleted {
        category: DailyWinCategory,
        at: DateTime<Utc>,
    },
    DailyWinsReset {
        day: NaiveDate,
        at: DateTime<Utc>,
    },
    StreakUpdated {
        streak_days: u32,
        longest_streak: u32,
        change: StreakChange,
        at: DateTime<Utc>,
    },
    StrikeRecorded {
        chance_counter: u8,
        at: DateTime<Utc>,
    },
    ShadowFatigueApplied {
        at: DateTime<Utc>,
    },
    ShadowFatigueCleared {
        at: DateTime<Utc>,
    },
    CurseActivated {
        at: DateTime<Utc>,
    },
    RecoveryQuestSpawned {
        quest_id: String,
        at: DateTime<Utc>,
    },
    CurseLifted {
        at: DateTime<Utc>,
    },
    WeeklyReset {
        week_start: NaiveDate,
        at: DateTime<Utc>,
    },
    ProfileUpdated {
        at: DateTime<Utc>,
    },
}

impl Event {
    /// The `type` tag, for storage columns and filters.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::QuestAdded { .. } => "quest_added",
            Event::QuestStarted { .. } => "quest_started",
            Event::QuestTaskAdded { .. } => "quest_task_added",
            Event::QuestTaskCompleted { .. } => "quest_task_completed",
            Event::QuestCompleted { .. } => "quest_completed",
            Event::QuestMissed { .. } => "quest_missed",
            Event::QuestDeleted { .. } => "quest_deleted",
            Event::TaskAdded { .. } => "task_added",
            Event::TaskCompleted { .. } => "task_completed",
            Event::TaskMissed { .. } => "task_missed",
            Event::TaskDeleted { .. } => "task_deleted",
            Event::ExpGained { .. } => "exp_gained",
            Event::GoldGained { .. } => "gold_gained",
            Event::LevelUp { .. } => "level_up",
            Event::RankChanged { .. } => "rank_changed",
            Event::StatLevelUp { .. } => "stat_level_up",
            Event::DailyWinCompleted { .. } => "daily_win_completed",
            Event::DailyWinsReset { .. } => "daily_wins_reset",
            Event::StreakUpdated { .. } => "streak_updated",
            Event::StrikeRecorded { .. } => "strike_recorded",
            Event::ShadowFatigueApplied { .. } => "shadow_fatigue_applied",
            Event::ShadowFatigueCleared { .. } => "shadow_fatigue_cleared",
            Event::CurseActivated { .. } => "curse_activated",
            Event::RecoveryQuestSpawned { .. } => "recovery_quest_spawned",
            Event::CurseLifted { .. } => "curse_lifted",
            Event::WeeklyReset { .. } => "weekly_reset",
            Event::ProfileUpdated { .. } => "profile_updated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_serde_tag() {
        let event = Event::StrikeRecorded {
            chance_counter: 2,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.kind());
        assert_eq!(json["chance_counter"], 2);
    }
}
