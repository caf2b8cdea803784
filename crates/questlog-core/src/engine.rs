//! Game engine.
//!
//! [`GameEngine`] owns the whole user aggregate (profile, quests, planner
//! tasks, penalty state, reset marks) and is the only thing that mutates it.
//! Every command reads the clock once, validates against the current state,
//! and only then mutates, so a rejected command leaves the aggregate as it
//! was. Successful commands run the deadline sweep after their own
//! transition and hand a snapshot to the [`StateStore`].
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = GameEngine::load(Arc::new(SystemClock), Database::open()?, config)?;
//! let quest = engine.add_quest(NewQuest::new("Ship it", NewQuestKind::Main, 100))?;
//! engine.start_quest(&quest.id)?;
//! engine.complete_quest(&quest.id)?;
//! for event in engine.drain_events() { /* ... */ }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, DayBoundary};
use crate::daily_wins::{next_streak, DailyWinCategory, StreakChange};
use crate::error::{EngineError, Result};
use crate::events::Event;
use crate::penalty::{PenaltyLevel, PenaltyState};
use crate::planner::{self, NewTask, PlannerTask, TaskCategory};
use crate::progression::{ExpGain, StatGain};
use crate::quest::{
    DailyQuestStatus, Difficulty, NewQuest, NewQuestTask, Quest, QuestKind, QuestState,
    QuestTask, QuotaSlot, SlotUsage,
};
use crate::scheduler::{ResetMarks, ResetScheduler, TickPlan};
use crate::storage::{RulesConfig, Snapshot, StateStore};
use crate::user::{StatKind, User, UserPatch};

/// Name given to the profile when no saved state exists.
pub const DEFAULT_PLAYER_NAME: &str = "Player";

/// The persisted aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub user: User,
    #[serde(default)]
    pub quests: Vec<Quest>,
    #[serde(default)]
    pub tasks: Vec<PlannerTask>,
    #[serde(default)]
    pub penalty: PenaltyState,
    #[serde(default)]
    pub marks: ResetMarks,
}

impl GameState {
    /// Fresh state. Reset marks start at `now` so the first tick is idle.
    pub fn new(name: impl Into<String>, config: &RulesConfig, now: DateTime<Utc>) -> Self {
        let boundary = config.day_boundary();
        let today = boundary.day_of(now);
        Self {
            user: User::new(name, &config.level_curve(), now),
            quests: Vec::new(),
            tasks: Vec::new(),
            penalty: PenaltyState::default(),
            marks: ResetMarks {
                last_daily_reset: Some(today),
                last_weekly_reset: Some(boundary.week_start(today)),
                last_curse_check: Some(now),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestCompletion {
    pub quest_id: String,
    pub exp: ExpGain,
    pub gold: u64,
    pub curse_lifted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskCompletion {
    pub task_id: String,
    pub exp: ExpGain,
    /// Set when this completion claimed a daily win.
    pub daily_win: Option<DailyWinCategory>,
    pub stat: Option<StatGain>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StreakReport {
    pub streak_days: u32,
    pub longest_streak: u32,
    pub change: StreakChange,
}

/// Outcome of one deadline sweep.
#[derive(Debug, Clone, Serialize)]
pub struct CurseReport {
    pub missed_quests: Vec<String>,
    pub missed_tasks: Vec<String>,
    pub strikes: usize,
    pub chance_counter: u8,
    pub level: PenaltyLevel,
    pub became_cursed: bool,
    pub recovery_quest_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub plan: TickPlan,
    pub daily_wins_reset: bool,
    pub curse: Option<CurseReport>,
    pub weekly_reset: bool,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn stat_amount(exp: u64) -> u32 {
    u32::try_from(exp).unwrap_or(u32::MAX)
}

fn blocked_reason(state: QuestState) -> &'static str {
    match state {
        QuestState::NotStarted => "quest has not been started",
        QuestState::Started => "quest already started",
        QuestState::Completed => "quest already completed",
        QuestState::Missed => "quest was missed",
    }
}

/// Rules engine over one user's aggregate.
pub struct GameEngine<S: StateStore> {
    state: GameState,
    clock: Arc<dyn Clock>,
    store: S,
    config: RulesConfig,
    scheduler: ResetScheduler,
    events: Vec<Event>,
    last_persist_error: Option<String>,
}

impl<S: StateStore> GameEngine<S> {
    /// Engine over a fresh profile. Nothing is loaded or saved yet.
    pub fn new(name: impl Into<String>, clock: Arc<dyn Clock>, store: S, config: RulesConfig) -> Self {
        let state = GameState::new(name, &config, clock.now());
        Self::from_state(state, clock, store, config)
    }

    pub fn from_state(state: GameState, clock: Arc<dyn Clock>, store: S, config: RulesConfig) -> Self {
        let scheduler = ResetScheduler::new(config.day_boundary(), config.curse_check_interval());
        Self {
            state,
            clock,
            store,
            config,
            scheduler,
            events: Vec::new(),
            last_persist_error: None,
        }
    }

    /// Restore from `store`, or start a fresh profile if it is empty, then
    /// run one tick so boundaries crossed while offline take effect.
    ///
    /// # Errors
    /// Returns `PersistenceUnavailable` if the stored snapshot cannot be read.
    pub fn load(clock: Arc<dyn Clock>, store: S, config: RulesConfig) -> Result<Self> {
        let saved = store.load()?;
        let mut engine = match saved {
            Some(snapshot) => {
                debug!(saved_at = %snapshot.saved_at, "restored saved state");
                Self::from_state(snapshot.state, clock, store, config)
            }
            None => {
                info!("no saved state, starting a fresh profile");
                let mut engine = Self::new(DEFAULT_PLAYER_NAME, clock, store, config);
                let now = engine.now();
                engine.persist(now);
                engine
            }
        };
        engine.tick();
        Ok(engine)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn user(&self) -> &User {
        &self.state.user
    }

    pub fn quests(&self) -> &[Quest] {
        &self.state.quests
    }

    pub fn quest(&self, id: &str) -> Option<&Quest> {
        self.state.quests.iter().find(|q| q.id == id)
    }

    pub fn tasks(&self) -> &[PlannerTask] {
        &self.state.tasks
    }

    pub fn task(&self, id: &str) -> Option<&PlannerTask> {
        self.state.tasks.iter().find(|t| t.id == id)
    }

    pub fn penalty(&self) -> &PenaltyState {
        &self.state.penalty
    }

    pub fn config(&self) -> &RulesConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Message of the most recent failed save, cleared by the next success.
    pub fn last_persist_error(&self) -> Option<&str> {
        self.last_persist_error.as_deref()
    }

    pub fn penalty_level(&self) -> PenaltyLevel {
        self.state.penalty.level()
    }

    /// EXP multiplier in effect right now.
    pub fn exp_multiplier(&self) -> f64 {
        self.state.penalty.multiplier(&self.config.penalty_rates())
    }

    /// True while cursed with an open Recovery Quest to redeem it.
    pub fn can_use_redemption(&self) -> bool {
        self.state.penalty.is_cursed && self.has_open_recovery()
    }

    pub fn can_start_quest(&self, id: &str) -> bool {
        let now = self.now();
        self.quest(id)
            .is_some_and(|q| self.check_start(q, now).is_ok())
    }

    pub fn can_complete_quest(&self, id: &str) -> bool {
        let now = self.now();
        self.quest(id)
            .is_some_and(|q| self.check_completion(q, now).is_ok())
    }

    pub fn get_daily_quest_completion_status(&self) -> DailyQuestStatus {
        let boundary = self.boundary();
        DailyQuestStatus::compute(&self.state.quests, boundary.day_of(self.now()), boundary)
    }

    /// Whether today's allowance for `slot` is used up.
    pub fn has_reached_daily_limit(&self, slot: QuotaSlot) -> bool {
        let now = self.now();
        let today = self.boundary().day_of(now);
        let cap = self.config.planner.attribute_tasks_per_day;
        match slot {
            QuotaSlot::Main | QuotaSlot::Side => {
                let usage = self.slot_usage(slot, now, None);
                !usage.allows_start()
            }
            QuotaSlot::DailyWin(category) => {
                self.state.user.daily_wins.is_completed(category)
                    || !planner::has_capacity(
                        &self.state.tasks,
                        TaskCategory::DailyWin(category),
                        today,
                        cap,
                    )
            }
            QuotaSlot::Attribute(stat) => {
                !planner::has_capacity(&self.state.tasks, TaskCategory::Attribute(stat), today, cap)
            }
        }
    }

    pub fn is_daily_win_completed(&self, category: DailyWinCategory) -> bool {
        self.state.user.daily_wins.is_completed(category)
    }

    pub fn are_all_daily_wins_completed(&self) -> bool {
        self.state.user.daily_wins.all_completed()
    }

    /// Versioned copy of the aggregate as it would be saved now.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.state.clone(), self.now())
    }

    pub fn pending_events(&self) -> &[Event] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // ── Quest commands ───────────────────────────────────────────────

    /// # Errors
    /// `InvalidInput` for an empty title or a zero reward.
    pub fn add_quest(&mut self, new: NewQuest) -> Result<Quest> {
        if new.title.trim().is_empty() {
            return Err(EngineError::input("title", "must not be empty"));
        }
        if new.exp_reward == 0 {
            return Err(EngineError::input("exp_reward", "must be positive"));
        }

        let now = self.now();
        let quest = new.into_quest(new_id(), now, self.boundary());
        debug!(quest_id = %quest.id, kind = %quest.kind, "quest added");
        self.emit(Event::QuestAdded {
            quest_id: quest.id.clone(),
            kind: quest.kind.label().to_string(),
            at: now,
        });
        self.state.quests.push(quest.clone());
        self.commit(now);
        Ok(quest)
    }

    /// # Errors
    /// `NotFound`, `InvalidTransition` unless the quest is startable, or
    /// `QuotaExceeded` when today's slot is taken.
    pub fn start_quest(&mut self, id: &str) -> Result<()> {
        let now = self.now();
        let idx = self.quest_index(id)?;
        self.check_start(&self.state.quests[idx], now)?;

        let quest = &mut self.state.quests[idx];
        quest.state = QuestState::Started;
        quest.started_at = Some(now);
        debug!(quest_id = id, "quest started");
        self.emit(Event::QuestStarted {
            quest_id: id.to_string(),
            at: now,
        });
        self.commit(now);
        Ok(())
    }

    /// # Errors
    /// `NotFound`, `InvalidInput` for an empty title, or `InvalidTransition`
    /// if the quest is already terminal.
    pub fn add_quest_task(&mut self, quest_id: &str, new: NewQuestTask) -> Result<QuestTask> {
        if new.title.trim().is_empty() {
            return Err(EngineError::input("title", "must not be empty"));
        }
        let now = self.now();
        let idx = self.quest_index(quest_id)?;
        let quest = &mut self.state.quests[idx];
        if quest.state.is_terminal() {
            return Err(EngineError::invalid(quest_id, "cannot add tasks to a finished quest"));
        }

        let task = new.into_task(new_id());
        quest.tasks.push(task.clone());
        self.emit(Event::QuestTaskAdded {
            quest_id: quest_id.to_string(),
            task_id: task.id.clone(),
            at: now,
        });
        self.commit(now);
        Ok(task)
    }

    /// Marks a subtask done. Subtasks carry no reward of their own.
    ///
    /// # Errors
    /// `NotFound` for an unknown quest or task, `InvalidTransition` if the
    /// quest is terminal or the task already done.
    pub fn complete_quest_task(&mut self, quest_id: &str, task_id: &str) -> Result<()> {
        let now = self.now();
        let idx = self.quest_index(quest_id)?;
        let quest = &mut self.state.quests[idx];
        if quest.state.is_terminal() {
            return Err(EngineError::invalid(quest_id, "quest is already finished"));
        }
        let task = quest.task_mut(task_id).ok_or_else(|| EngineError::NotFound {
            entity: "task",
            id: task_id.to_string(),
        })?;
        if task.completed {
            return Err(EngineError::invalid(task_id, "task already completed"));
        }

        task.completed = true;
        task.completed_at = Some(now);
        self.emit(Event::QuestTaskCompleted {
            quest_id: quest_id.to_string(),
            task_id: task_id.to_string(),
            at: now,
        });
        self.commit(now);
        Ok(())
    }

    /// Completes a quest and pays out its reward. Runs before the deadline
    /// sweep, so a quest whose deadline passed since the last sweep can
    /// still be completed.
    ///
    /// # Errors
    /// `NotFound`, `InvalidTransition` if the quest is not completable, or
    /// `QuotaExceeded` if a quest of the same slot was already completed
    /// today.
    pub fn complete_quest(&mut self, id: &str) -> Result<QuestCompletion> {
        let now = self.now();
        let idx = self.quest_index(id)?;
        self.check_completion(&self.state.quests[idx], now)?;

        let rank = self.state.user.rank;
        let quest = &mut self.state.quests[idx];
        if quest.started_at.is_none() {
            // Dailies may be completed straight from NotStarted
            quest.started_at = Some(now);
        }
        quest.state = QuestState::Completed;
        quest.completed_at = Some(now);
        let raw = quest.exp_reward;
        let category = quest.category;
        let is_recovery = quest.kind.is_recovery();

        let exp = self.grant_exp(raw, now);
        let gold = self.config.gold_policy().gold_for(raw, rank);
        self.grant_gold(gold, now);
        self.emit(Event::QuestCompleted {
            quest_id: id.to_string(),
            exp_gained: exp.effective,
            gold_gained: gold,
            at: now,
        });
        match category {
            Some(TaskCategory::DailyWin(c)) => {
                self.claim_daily_win(c, now);
            }
            Some(TaskCategory::Attribute(stat)) => {
                self.grant_stat(stat, stat_amount(raw), now);
            }
            None => {}
        }

        if self.state.penalty.clear_fatigue() {
            self.emit(Event::ShadowFatigueCleared { at: now });
        }
        let curse_lifted = is_recovery && self.state.penalty.is_cursed;
        if curse_lifted {
            self.state.penalty.lift_curse();
            info!(quest_id = id, "recovery quest completed, curse lifted");
            self.emit(Event::CurseLifted { at: now });
        }

        info!(quest_id = id, exp = exp.effective, gold, "quest completed");
        self.commit(now);
        Ok(QuestCompletion {
            quest_id: id.to_string(),
            exp,
            gold,
            curse_lifted,
        })
    }

    /// # Errors
    /// `NotFound`, or `InvalidTransition` for the open Recovery Quest while
    /// cursed.
    pub fn delete_quest(&mut self, id: &str) -> Result<Quest> {
        let now = self.now();
        let idx = self.quest_index(id)?;
        let quest = &self.state.quests[idx];
        if quest.kind.is_recovery() && quest.is_open() && self.state.penalty.is_cursed {
            return Err(EngineError::invalid(
                id,
                "the recovery quest cannot be deleted while cursed",
            ));
        }

        let removed = self.state.quests.remove(idx);
        self.emit(Event::QuestDeleted {
            quest_id: id.to_string(),
            at: now,
        });
        self.commit(now);
        Ok(removed)
    }

    // ── Planner commands ─────────────────────────────────────────────

    /// Schedules a planner task, for today unless the task says otherwise.
    ///
    /// # Errors
    /// `InvalidInput` for an empty title, `QuotaExceeded` when the
    /// `(category, day)` allowance is used up.
    pub fn add_task(&mut self, new: NewTask) -> Result<PlannerTask> {
        if new.title.trim().is_empty() {
            return Err(EngineError::input("title", "must not be empty"));
        }
        let now = self.now();
        let day = new
            .scheduled_for
            .unwrap_or_else(|| self.boundary().day_of(now));
        let cap = self.config.planner.attribute_tasks_per_day;
        if !planner::has_capacity(&self.state.tasks, new.category, day, cap) {
            debug!(category = %new.category, %day, "planner task rejected by quota");
            return Err(EngineError::QuotaExceeded {
                slot: new.category.quota_slot(),
            });
        }

        let task = new.into_task(new_id(), day, now);
        self.emit(Event::TaskAdded {
            task_id: task.id.clone(),
            at: now,
        });
        self.state.tasks.push(task.clone());
        self.commit(now);
        Ok(task)
    }

    /// Completes a planner task. The EXP reward takes the penalty
    /// multiplier. A daily-win task scheduled for today claims its win; an
    /// attribute task feeds its stat.
    ///
    /// # Errors
    /// `NotFound`, or `InvalidTransition` if the task is already finished.
    pub fn complete_task(&mut self, id: &str) -> Result<TaskCompletion> {
        let now = self.now();
        let today = self.boundary().day_of(now);
        let idx = self.task_index(id)?;
        let task = &mut self.state.tasks[idx];
        if task.completed {
            return Err(EngineError::invalid(id, "task already completed"));
        }
        if task.missed {
            return Err(EngineError::invalid(id, "task was missed"));
        }

        task.completed = true;
        task.completed_at = Some(now);
        let raw = task.exp_reward;
        let category = task.category;
        let scheduled_today = task.scheduled_for == today;

        let exp = self.grant_exp(raw, now);
        let (daily_win, stat) = match category {
            TaskCategory::DailyWin(c) if scheduled_today => {
                (self.claim_daily_win(c, now).then_some(c), None)
            }
            TaskCategory::DailyWin(_) => (None, None),
            TaskCategory::Attribute(s) => (None, Some(self.grant_stat(s, stat_amount(raw), now))),
        };
        self.emit(Event::TaskCompleted {
            task_id: id.to_string(),
            exp_gained: exp.effective,
            at: now,
        });
        self.commit(now);
        Ok(TaskCompletion {
            task_id: id.to_string(),
            exp,
            daily_win,
            stat,
        })
    }

    /// # Errors
    /// `NotFound` for an unknown id.
    pub fn delete_task(&mut self, id: &str) -> Result<PlannerTask> {
        let now = self.now();
        let idx = self.task_index(id)?;
        let removed = self.state.tasks.remove(idx);
        self.emit(Event::TaskDeleted {
            task_id: id.to_string(),
            at: now,
        });
        self.commit(now);
        Ok(removed)
    }

    // ── Progression commands ─────────────────────────────────────────

    /// Credits `floor(raw * multiplier)` EXP.
    pub fn add_exp(&mut self, raw: u64) -> ExpGain {
        let now = self.now();
        let gain = self.grant_exp(raw, now);
        self.commit(now);
        gain
    }

    /// Adds gold with no multiplier; returns the new balance.
    pub fn add_gold(&mut self, amount: u64) -> u64 {
        let now = self.now();
        self.grant_gold(amount, now);
        self.commit(now);
        self.state.user.gold
    }

    /// Stat EXP is never scaled by penalties.
    pub fn increase_stat_free(&mut self, stat: StatKind, amount: u32) -> StatGain {
        let now = self.now();
        let gain = self.grant_stat(stat, amount, now);
        self.commit(now);
        gain
    }

    /// Patches cosmetic profile fields.
    ///
    /// # Errors
    /// `InvalidInput` for an empty patch or a blank name.
    pub fn update_user(&mut self, patch: UserPatch) -> Result<User> {
        if patch.is_empty() {
            return Err(EngineError::input("patch", "nothing to update"));
        }
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(EngineError::input("name", "must not be empty"));
        }
        let now = self.now();
        self.state.user.apply_patch(patch);
        self.emit(Event::ProfileUpdated { at: now });
        self.commit(now);
        Ok(self.state.user.clone())
    }

    // ── Daily wins & streak ──────────────────────────────────────────

    /// Records today's activity for the login streak.
    pub fn update_streak(&mut self) -> StreakReport {
        let now = self.now();
        let boundary = *self.boundary();
        let user = &mut self.state.user;
        let last_day = user.last_login.map(|t| boundary.day_of(t));
        let (streak_days, change) = next_streak(last_day, boundary.day_of(now), user.streak_days);

        user.streak_days = streak_days;
        user.longest_streak = user.longest_streak.max(streak_days);
        user.last_login = Some(user.last_login.map_or(now, |t| t.max(now)));
        let report = StreakReport {
            streak_days,
            longest_streak: user.longest_streak,
            change,
        };

        debug!(streak_days, ?change, "streak updated");
        self.emit(Event::StreakUpdated {
            streak_days,
            longest_streak: report.longest_streak,
            change,
            at: now,
        });
        self.commit(now);
        report
    }

    /// Clears the daily wins once per local day. Returns whether a reset
    /// happened.
    pub fn check_reset_daily_wins(&mut self) -> bool {
        let now = self.now();
        let today = self.boundary().day_of(now);
        let reset = self.reset_daily_wins(today, now);
        if reset {
            self.persist(now);
        }
        reset
    }

    /// Claims a daily win directly.
    ///
    /// # Errors
    /// `InvalidTransition` if the win was already claimed today.
    pub fn complete_daily_win(&mut self, category: DailyWinCategory) -> Result<()> {
        if self.state.user.daily_wins.is_completed(category) {
            return Err(EngineError::invalid(
                category.as_str(),
                "daily win already completed today",
            ));
        }
        let now = self.now();
        self.claim_daily_win(category, now);
        self.commit(now);
        Ok(())
    }

    // ── Penalties & scheduling ───────────────────────────────────────

    /// Sweeps deadlines, records one strike per newly missed quest or task,
    /// and spawns a Recovery Quest if cursed without one.
    pub fn check_curse_status(&mut self) -> CurseReport {
        let now = self.now();
        let report = self.run_curse_check(now);
        self.persist(now);
        report
    }

    /// Runs whatever boundaries `now` has crossed, in order: daily reset,
    /// deadline sweep, weekly reset.
    pub fn on_tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let plan = self.scheduler.plan(&self.state.marks, now);
        let mut report = TickReport {
            plan,
            daily_wins_reset: false,
            curse: None,
            weekly_reset: false,
        };
        if plan.is_idle() {
            return report;
        }

        if plan.day_rolled {
            report.daily_wins_reset = self.reset_daily_wins(plan.today, now);
        }
        if plan.curse_check_due {
            report.curse = Some(self.run_curse_check(now));
        }
        if plan.week_rolled {
            self.apply_weekly_reset(plan.week_start, now);
            report.weekly_reset = true;
        }
        self.persist(now);
        report
    }

    /// [`GameEngine::on_tick`] at the clock's current time.
    pub fn tick(&mut self) -> TickReport {
        let now = self.now();
        self.on_tick(now)
    }

    // ── Internals ────────────────────────────────────────────────────

    fn boundary(&self) -> &DayBoundary {
        self.scheduler.boundary()
    }

    fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    fn quest_index(&self, id: &str) -> Result<usize> {
        self.state
            .quests
            .iter()
            .position(|q| q.id == id)
            .ok_or_else(|| EngineError::quest_not_found(id))
    }

    fn task_index(&self, id: &str) -> Result<usize> {
        self.state
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| EngineError::NotFound {
                entity: "task",
                id: id.to_string(),
            })
    }

    fn slot_usage(&self, slot: QuotaSlot, now: DateTime<Utc>, exclude: Option<&str>) -> SlotUsage {
        let boundary = self.boundary();
        SlotUsage::of(&self.state.quests, slot, boundary.day_of(now), boundary, exclude)
    }

    fn has_open_recovery(&self) -> bool {
        self.state
            .quests
            .iter()
            .any(|q| q.kind.is_recovery() && q.is_open())
    }

    fn check_start(&self, quest: &Quest, now: DateTime<Utc>) -> Result<()> {
        if !quest.can_transition_to(QuestState::Started) {
            return Err(EngineError::invalid(&quest.id, blocked_reason(quest.state)));
        }
        if quest.deadline_passed(now) {
            return Err(EngineError::invalid(&quest.id, "deadline has passed"));
        }
        if quest.kind.is_recovery() && !self.state.penalty.is_cursed {
            return Err(EngineError::invalid(
                &quest.id,
                "recovery quests can only be started while cursed",
            ));
        }
        if let Some(slot) = quest.kind.quota_slot() {
            let usage = self.slot_usage(slot, now, Some(&quest.id));
            if !usage.allows_start() {
                debug!(quest_id = %quest.id, %slot, ?usage, "start rejected by quota");
                return Err(EngineError::QuotaExceeded { slot });
            }
        }
        Ok(())
    }

    fn check_completion(&self, quest: &Quest, now: DateTime<Utc>) -> Result<()> {
        if !quest.can_transition_to(QuestState::Completed) {
            return Err(EngineError::invalid(&quest.id, blocked_reason(quest.state)));
        }
        // Non-daily quests may finish up to one curse-check interval late,
        // the window in which the sweep has not yet had a chance to run.
        let grace = if quest.kind.is_daily() {
            Duration::zero()
        } else {
            self.config.curse_check_interval()
        };
        if quest.deadline.is_some_and(|d| d + grace < now) {
            return Err(EngineError::invalid(&quest.id, "deadline has passed"));
        }

        let open = quest.tasks.iter().filter(|t| !t.completed).count();
        if open > 0 {
            return Err(EngineError::invalid(
                &quest.id,
                format!("{open} task(s) still incomplete"),
            ));
        }
        if let Some(slot) = quest.kind.quota_slot() {
            if !self.slot_usage(slot, now, Some(&quest.id)).allows_completion() {
                debug!(quest_id = %quest.id, %slot, "completion rejected by quota");
                return Err(EngineError::QuotaExceeded { slot });
            }
        }
        Ok(())
    }

    fn grant_exp(&mut self, raw: u64, now: DateTime<Utc>) -> ExpGain {
        let multiplier = self.exp_multiplier();
        let gain = self
            .state
            .user
            .add_exp(raw, multiplier, &self.config.level_curve());
        self.emit(Event::ExpGained {
            raw,
            effective: gain.effective,
            at: now,
        });
        if gain.levels_gained() > 0 {
            info!(from = gain.level_before, to = gain.level_after, "level up");
            self.emit(Event::LevelUp {
                from: gain.level_before,
                to: gain.level_after,
                at: now,
            });
        }
        if gain.rank_changed() {
            info!(from = %gain.rank_before, to = %gain.rank_after, "rank changed");
            self.emit(Event::RankChanged {
                from: gain.rank_before,
                to: gain.rank_after,
                at: now,
            });
        }
        gain
    }

    fn grant_gold(&mut self, amount: u64, now: DateTime<Utc>) {
        if amount == 0 {
            return;
        }
        let total = self.state.user.add_gold(amount);
        self.emit(Event::GoldGained {
            amount,
            total,
            at: now,
        });
    }

    fn grant_stat(&mut self, stat: StatKind, amount: u32, now: DateTime<Utc>) -> StatGain {
        let per_level = self.config.progression.stat_exp_per_level;
        let gain = self.state.user.increase_stat(stat, amount, per_level);
        if gain.level_after > gain.level_before {
            self.emit(Event::StatLevelUp {
                stat,
                level: gain.level_after,
                at: now,
            });
        }
        gain
    }

    fn claim_daily_win(&mut self, category: DailyWinCategory, now: DateTime<Utc>) -> bool {
        let newly = self.state.user.daily_wins.mark(category);
        if newly {
            self.emit(Event::DailyWinCompleted { category, at: now });
        }
        newly
    }

    fn reset_daily_wins(&mut self, today: NaiveDate, now: DateTime<Utc>) -> bool {
        if self.state.marks.last_daily_reset == Some(today) {
            return false;
        }
        self.state.user.daily_wins.clear();
        self.state.marks.last_daily_reset = Some(today);
        debug!(%today, "daily wins reset");
        self.emit(Event::DailyWinsReset { day: today, at: now });
        true
    }

    fn run_curse_check(&mut self, now: DateTime<Utc>) -> CurseReport {
        let rates = self.config.penalty_rates();

        let mut missed_quests = Vec::new();
        for quest in self.state.quests.iter_mut().filter(|q| q.is_sweepable(now)) {
            quest.mark_missed(now);
            missed_quests.push(quest.id.clone());
        }
        let mut missed_tasks = Vec::new();
        for task in self.state.tasks.iter_mut().filter(|t| t.is_sweepable(now)) {
            task.missed = true;
            missed_tasks.push(task.id.clone());
        }
        for quest_id in &missed_quests {
            self.emit(Event::QuestMissed {
                quest_id: quest_id.clone(),
                at: now,
            });
        }
        for task_id in &missed_tasks {
            self.emit(Event::TaskMissed {
                task_id: task_id.clone(),
                at: now,
            });
        }

        let strikes = missed_quests.len() + missed_tasks.len();
        let mut became_cursed = false;
        for _ in 0..strikes {
            let outcome = self.state.penalty.record_strike(&rates);
            self.emit(Event::StrikeRecorded {
                chance_counter: outcome.chance_counter,
                at: now,
            });
            if outcome.became_fatigued {
                info!(strikes = outcome.chance_counter, "shadow fatigue applied");
                self.emit(Event::ShadowFatigueApplied { at: now });
            }
            if outcome.became_cursed {
                info!("curse activated");
                became_cursed = true;
                self.emit(Event::CurseActivated { at: now });
            }
        }
        if strikes > 0 {
            debug!(
                quests = missed_quests.len(),
                tasks = missed_tasks.len(),
                chance_counter = self.state.penalty.chance_counter,
                "deadline sweep recorded strikes"
            );
        }

        let recovery_quest_id = if self.state.penalty.is_cursed && !self.has_open_recovery() {
            Some(self.spawn_recovery_quest(now))
        } else {
            None
        };
        self.state.marks.last_curse_check = Some(now);

        CurseReport {
            missed_quests,
            missed_tasks,
            strikes,
            chance_counter: self.state.penalty.chance_counter,
            level: self.state.penalty.level(),
            became_cursed,
            recovery_quest_id,
        }
    }

    fn spawn_recovery_quest(&mut self, now: DateTime<Utc>) -> String {
        let template = &self.config.recovery;
        let quest = Quest {
            id: new_id(),
            title: template.title.clone(),
            description: template.description.clone(),
            kind: QuestKind::Recovery { spawned_at: now },
            exp_reward: template.exp_reward,
            difficulty: Difficulty::Hard,
            category: None,
            tasks: template
                .tasks
                .iter()
                .map(|title| NewQuestTask::new(title.clone()).into_task(new_id()))
                .collect(),
            deadline: None,
            state: QuestState::NotStarted,
            created_at: now,
            started_at: None,
            completed_at: None,
            missed_at: None,
        };
        let id = quest.id.clone();
        self.state.quests.push(quest);
        self.state.penalty.can_use_redemption = true;
        info!(quest_id = %id, "recovery quest spawned");
        self.emit(Event::RecoveryQuestSpawned {
            quest_id: id.clone(),
            at: now,
        });
        id
    }

    fn apply_weekly_reset(&mut self, week_start: NaiveDate, now: DateTime<Utc>) {
        let was_cursed = self.state.penalty.is_cursed;
        self.state.penalty.weekly_reset();

        let (stale, kept): (Vec<Quest>, Vec<Quest>) = std::mem::take(&mut self.state.quests)
            .into_iter()
            .partition(|q| q.kind.is_recovery() && q.is_open());
        self.state.quests = kept;
        for quest in stale {
            self.emit(Event::QuestDeleted {
                quest_id: quest.id,
                at: now,
            });
        }

        self.state.marks.last_weekly_reset = Some(week_start);
        if was_cursed {
            self.emit(Event::CurseLifted { at: now });
        }
        info!(%week_start, was_cursed, "weekly reset");
        self.emit(Event::WeeklyReset { week_start, at: now });
    }

    /// Sweep then save. Every successful command ends here.
    fn commit(&mut self, now: DateTime<Utc>) {
        self.run_curse_check(now);
        self.persist(now);
    }

    fn persist(&mut self, now: DateTime<Utc>) {
        let snapshot = Snapshot::new(self.state.clone(), now);
        match self.store.save(&snapshot) {
            Ok(()) => self.last_persist_error = None,
            Err(e) => {
                warn!(error = %e, "failed to persist state");
                self.last_persist_error = Some(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::StoreError;
    use crate::quest::NewQuestKind;
    use crate::storage::MemoryStore;
    use chrono::Duration;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn engine_at(start: &str) -> (GameEngine<MemoryStore>, ManualClock) {
        let clock = ManualClock::new(ts(start));
        let engine = GameEngine::new(
            "tester",
            Arc::new(clock.clone()),
            MemoryStore::new(),
            RulesConfig::default(),
        );
        (engine, clock)
    }

    struct ReadOnlyStore;

    impl StateStore for ReadOnlyStore {
        fn load(&self) -> std::result::Result<Option<Snapshot>, StoreError> {
            Ok(None)
        }

        fn save(&self, _snapshot: &Snapshot) -> std::result::Result<(), StoreError> {
            Err(StoreError::DataDir("read-only".into()))
        }
    }

    #[test]
    fn fresh_engine_is_idle_on_first_tick() {
        let (mut engine, _clock) = engine_at("2024-01-03T10:00:00Z");
        let report = engine.tick();
        assert!(report.plan.is_idle());
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn daily_quest_deadline_is_forced_to_end_of_day() {
        let (mut engine, _clock) = engine_at("2024-01-03T10:00:00Z");
        let quest = engine
            .add_quest(
                NewQuest::new("Stretch", NewQuestKind::Daily, 10)
                    .with_deadline(ts("2024-02-01T00:00:00Z")),
            )
            .unwrap();
        assert_eq!(quest.deadline, Some(ts("2024-01-03T23:59:59Z")));
    }

    #[test]
    fn daily_quest_completes_without_start() {
        let (mut engine, _clock) = engine_at("2024-01-03T10:00:00Z");
        let quest = engine
            .add_quest(NewQuest::new("Stretch", NewQuestKind::Daily, 10))
            .unwrap();
        let done = engine.complete_quest(&quest.id).unwrap();
        assert_eq!(done.exp.effective, 10);
        let quest = engine.quest(&quest.id).unwrap();
        assert!(quest.is_completed());
        assert!(quest.is_started());
    }

    #[test]
    fn rejected_command_leaves_state_untouched() {
        let (mut engine, _clock) = engine_at("2024-01-03T10:00:00Z");
        let quest = engine
            .add_quest(NewQuest::new("Write", NewQuestKind::Main, 50))
            .unwrap();
        engine
            .add_quest_task(&quest.id, NewQuestTask::new("Draft"))
            .unwrap();
        engine.start_quest(&quest.id).unwrap();
        engine.drain_events();
        let before = serde_json::to_string(engine.state()).unwrap();

        let err = engine.complete_quest(&quest.id).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
        assert_eq!(serde_json::to_string(engine.state()).unwrap(), before);
        assert!(engine.pending_events().is_empty());
    }

    #[test]
    fn recovery_quest_cannot_start_unless_cursed() {
        let (mut engine, _clock) = engine_at("2024-01-03T10:00:00Z");
        let now = engine.now();
        let id = engine.spawn_recovery_quest(now);
        assert!(!engine.can_start_quest(&id));
        assert!(matches!(
            engine.start_quest(&id),
            Err(EngineError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn persist_failure_is_recorded_not_raised() {
        let clock = ManualClock::new(ts("2024-01-03T10:00:00Z"));
        let mut engine = GameEngine::new(
            "tester",
            Arc::new(clock),
            ReadOnlyStore,
            RulesConfig::default(),
        );
        let gain = engine.add_exp(30);
        assert_eq!(gain.effective, 30);
        assert_eq!(engine.user().exp, 30);
        assert!(engine
            .last_persist_error()
            .is_some_and(|e| e.contains("read-only")));
    }

    #[test]
    fn every_successful_command_saves() {
        let (mut engine, clock) = engine_at("2024-01-03T10:00:00Z");
        engine.add_gold(5);
        engine.increase_stat_free(StatKind::Social, 20);
        clock.advance(Duration::minutes(1));
        engine.update_streak();
        assert_eq!(engine.store().save_count(), 3);
        assert!(engine.last_persist_error().is_none());
    }

    #[test]
    fn load_restores_saved_state() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(ts("2024-01-03T10:00:00Z"));
        {
            let mut engine =
                GameEngine::new("tester", Arc::new(clock.clone()), &store, RulesConfig::default());
            engine.add_gold(77);
        }
        let engine = GameEngine::load(Arc::new(clock), &store, RulesConfig::default()).unwrap();
        assert_eq!(engine.user().gold, 77);
        assert_eq!(engine.user().name, "tester");
    }

    #[test]
    fn load_from_empty_store_starts_fresh() {
        let clock = ManualClock::new(ts("2024-01-03T10:00:00Z"));
        let engine =
            GameEngine::load(Arc::new(clock), MemoryStore::new(), RulesConfig::default()).unwrap();
        assert_eq!(engine.user().name, DEFAULT_PLAYER_NAME);
        assert_eq!(engine.store().save_count(), 1);
    }
}
