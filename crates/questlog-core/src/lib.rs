//! # Questlog Core Library
//!
//! This library provides the progression and penalty rules engine for
//! Questlog, a personal gamification tracker. Real-life tasks and quests earn
//! experience, gold, levels and ranks; missed deadlines accrue strikes that
//! end in a curse. Every operation is available through the standalone CLI
//! binary, which is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Game Engine**: Owns the user aggregate and exposes the full
//!   command/query surface. Time comes from an injected [`Clock`]
//! - **Quest State Machine**: Quest lifecycle, daily main/side quotas and
//!   deadline tracking
//! - **Penalty Engine**: Strike counter, Shadow Fatigue, curse and
//!   Recovery Quests
//! - **Reset Scheduler**: Pure day/week/curse-check boundary detection that
//!   the caller drives through [`GameEngine::on_tick`]
//! - **Storage**: SQLite snapshot and event history, TOML rules configuration
//!
//! ## Key Components
//!
//! - [`GameEngine`]: Rules engine and aggregate owner
//! - [`StateStore`]: Persistence collaborator ([`Database`], [`MemoryStore`])
//! - [`RulesConfig`]: Tunable numbers of the rules
//! - [`Event`]: Everything that happened, for history and notifications

pub mod clock;
pub mod daily_wins;
pub mod engine;
pub mod error;
pub mod events;
pub mod penalty;
pub mod planner;
pub mod progression;
pub mod quest;
pub mod scheduler;
pub mod storage;
pub mod user;

pub use clock::{Clock, DayBoundary, ManualClock, SystemClock};
pub use daily_wins::{DailyWinCategory, DailyWins, StreakChange};
pub use engine::{
    CurseReport, GameEngine, GameState, QuestCompletion, StreakReport, TaskCompletion, TickReport,
};
pub use error::{ConfigError, EngineError, StoreError};
pub use events::Event;
pub use penalty::{PenaltyLevel, PenaltyState};
pub use planner::{NewTask, PlannerTask, TaskCategory};
pub use progression::{ExpGain, LevelCurve, Rank, StatGain};
pub use quest::{
    DailyQuestStatus, Difficulty, NewQuest, NewQuestKind, NewQuestTask, Quest, QuestKind,
    QuestState, QuestTask, QuotaSlot,
};
pub use scheduler::{ResetMarks, ResetScheduler, TickPlan};
pub use storage::{Database, HistoryEntry, MemoryStore, RulesConfig, Snapshot, StateStore};
pub use user::{StatKind, User, UserPatch};
