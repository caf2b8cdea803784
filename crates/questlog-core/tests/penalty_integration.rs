//! Integration tests for strikes, Shadow Fatigue, curses and Recovery Quests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use questlog_core::{
    EngineError, Event, GameEngine, ManualClock, MemoryStore, NewQuest, NewQuestKind,
    NewQuestTask, PenaltyLevel, QuestState, QuotaSlot, RulesConfig,
};

fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn setup_at(start: &str) -> (GameEngine<MemoryStore>, ManualClock) {
    let clock = ManualClock::new(ts(start));
    let engine = GameEngine::new(
        "Jin",
        Arc::new(clock.clone()),
        MemoryStore::new(),
        RulesConfig::default(),
    );
    (engine, clock)
}

/// Adds `n` dailies on Wednesday 2024-01-03 and lets them lapse into Thursday.
fn miss_dailies(engine: &mut GameEngine<MemoryStore>, clock: &ManualClock, n: usize) {
    for i in 0..n {
        engine
            .add_quest(NewQuest::new(format!("Daily {i}"), NewQuestKind::Daily, 10))
            .unwrap();
    }
    clock.set(ts("2024-01-04T00:00:01Z"));
    engine.check_curse_status();
}

fn open_recovery_count(engine: &GameEngine<MemoryStore>) -> usize {
    engine
        .quests()
        .iter()
        .filter(|q| q.kind.is_recovery() && q.is_open())
        .count()
}

#[test]
fn test_started_quest_missed_after_deadline() {
    let (mut engine, clock) = setup_at("2024-01-01T09:00:00Z");
    let quest = engine
        .add_quest(
            NewQuest::new("File taxes", NewQuestKind::Main, 80)
                .with_deadline(ts("2024-01-01T23:59:59Z")),
        )
        .unwrap();
    engine
        .add_quest_task(&quest.id, NewQuestTask::new("Gather receipts"))
        .unwrap();
    engine.start_quest(&quest.id).unwrap();

    clock.set(ts("2024-01-02T00:00:01Z"));
    let report = engine.check_curse_status();
    assert_eq!(report.missed_quests, vec![quest.id.clone()]);
    assert_eq!(report.chance_counter, 1);
    assert_eq!(report.level, PenaltyLevel::Safe);

    let quest = engine.quest(&quest.id).unwrap();
    assert_eq!(quest.state, QuestState::Missed);
    assert!(quest.missed_at.is_some());
    assert!(!quest.is_completed());
}

#[test]
fn test_sweep_is_idempotent() {
    let (mut engine, clock) = setup_at("2024-01-03T10:00:00Z");
    miss_dailies(&mut engine, &clock, 2);
    assert_eq!(engine.penalty().chance_counter, 2);

    let again = engine.check_curse_status();
    assert_eq!(again.strikes, 0);
    assert!(again.missed_quests.is_empty());
    assert_eq!(engine.penalty().chance_counter, 2);
    assert_eq!(engine.penalty_level(), PenaltyLevel::Warning);
}

#[test]
fn test_shadow_fatigue_at_three_strikes() {
    let (mut engine, clock) = setup_at("2024-01-03T10:00:00Z");
    miss_dailies(&mut engine, &clock, 3);

    assert!(engine.penalty().has_shadow_fatigue);
    assert!(!engine.penalty().is_cursed);
    assert_eq!(engine.exp_multiplier(), 0.75);
    assert_eq!(engine.add_exp(100).effective, 75);

    // Any quest completion clears fatigue; the reward itself is still reduced
    let quest = engine
        .add_quest(NewQuest::new("Walk", NewQuestKind::Daily, 20))
        .unwrap();
    engine.drain_events();
    let done = engine.complete_quest(&quest.id).unwrap();
    assert_eq!(done.exp.effective, 15);
    assert!(!engine.penalty().has_shadow_fatigue);
    assert_eq!(engine.exp_multiplier(), 1.0);
    assert!(engine
        .drain_events()
        .iter()
        .any(|e| matches!(e, Event::ShadowFatigueCleared { .. })));
}

#[test]
fn test_add_exp_while_cursed_yields_half() {
    let (mut engine, clock) = setup_at("2024-01-03T10:00:00Z");
    for i in 0..5 {
        engine
            .add_quest(NewQuest::new(format!("Daily {i}"), NewQuestKind::Daily, 10))
            .unwrap();
    }
    clock.set(ts("2024-01-04T00:00:01Z"));
    let report = engine.check_curse_status();
    assert_eq!(report.strikes, 5);
    assert!(report.became_cursed);
    assert!(report.recovery_quest_id.is_some());

    assert_eq!(engine.penalty_level(), PenaltyLevel::Cursed);
    assert_eq!(engine.exp_multiplier(), 0.5);
    let gain = engine.add_exp(100);
    assert_eq!(gain.effective, 50);
    assert_eq!(engine.user().exp, 50);
}

#[test]
fn test_curse_dominates_fatigue() {
    let (mut engine, clock) = setup_at("2024-01-03T10:00:00Z");
    miss_dailies(&mut engine, &clock, 5);
    // Fatigue set at strike three stays flagged, but the curse rate applies
    assert!(engine.penalty().has_shadow_fatigue);
    assert!(engine.penalty().is_cursed);
    assert_eq!(engine.exp_multiplier(), 0.5);
}

#[test]
fn test_strike_cap_and_single_recovery_quest() {
    let (mut engine, clock) = setup_at("2024-01-03T10:00:00Z");
    miss_dailies(&mut engine, &clock, 7);
    assert_eq!(engine.penalty().chance_counter, 5);
    assert_eq!(open_recovery_count(&engine), 1);

    for i in 0..2 {
        engine
            .add_quest(NewQuest::new(format!("Thursday {i}"), NewQuestKind::Daily, 10))
            .unwrap();
    }
    clock.set(ts("2024-01-05T00:00:01Z"));
    let report = engine.check_curse_status();
    assert_eq!(report.strikes, 2);
    assert!(!report.became_cursed);
    assert!(report.recovery_quest_id.is_none());
    assert_eq!(engine.penalty().chance_counter, 5);
    assert_eq!(open_recovery_count(&engine), 1);
}

#[test]
fn test_recovery_quest_lifts_curse() {
    let (mut engine, clock) = setup_at("2024-01-03T10:00:00Z");
    miss_dailies(&mut engine, &clock, 5);
    assert!(engine.can_use_redemption());

    let recovery = engine
        .quests()
        .iter()
        .find(|q| q.kind.is_recovery())
        .cloned()
        .unwrap();
    assert_eq!(recovery.tasks.len(), 3);
    assert_eq!(recovery.exp_reward, 50);

    engine.start_quest(&recovery.id).unwrap();
    for task in &recovery.tasks {
        engine.complete_quest_task(&recovery.id, &task.id).unwrap();
    }
    let done = engine.complete_quest(&recovery.id).unwrap();

    // Paid at the cursed rate; the curse lifts afterwards
    assert_eq!(done.exp.effective, 25);
    assert_eq!(done.gold, 5);
    assert!(done.curse_lifted);

    let penalty = engine.penalty();
    assert_eq!(penalty.chance_counter, 0);
    assert!(!penalty.is_cursed);
    assert!(!penalty.has_shadow_fatigue);
    assert!(!penalty.can_use_redemption);
    assert!(!engine.can_use_redemption());
    assert_eq!(engine.penalty_level(), PenaltyLevel::Safe);
    assert_eq!(engine.exp_multiplier(), 1.0);
}

#[test]
fn test_recovery_quest_needs_free_side_slot() {
    let (mut engine, clock) = setup_at("2024-01-03T10:00:00Z");
    miss_dailies(&mut engine, &clock, 5);
    let side = engine
        .add_quest(NewQuest::new("Errands", NewQuestKind::Side, 20))
        .unwrap();
    engine.start_quest(&side.id).unwrap();

    let recovery_id = engine
        .quests()
        .iter()
        .find(|q| q.kind.is_recovery())
        .map(|q| q.id.clone())
        .unwrap();
    assert!(!engine.can_start_quest(&recovery_id));
    assert!(matches!(
        engine.start_quest(&recovery_id),
        Err(EngineError::QuotaExceeded {
            slot: QuotaSlot::Side
        })
    ));
}

#[test]
fn test_recovery_quest_cannot_be_deleted_while_cursed() {
    let (mut engine, clock) = setup_at("2024-01-03T10:00:00Z");
    miss_dailies(&mut engine, &clock, 5);
    let recovery_id = engine
        .quests()
        .iter()
        .find(|q| q.kind.is_recovery())
        .map(|q| q.id.clone())
        .unwrap();

    assert!(matches!(
        engine.delete_quest(&recovery_id),
        Err(EngineError::InvalidTransition { .. })
    ));
    assert_eq!(open_recovery_count(&engine), 1);
}

#[test]
fn test_curse_events_are_emitted_in_order() {
    let (mut engine, clock) = setup_at("2024-01-03T10:00:00Z");
    miss_dailies(&mut engine, &clock, 5);
    let kinds: Vec<&str> = engine.pending_events().iter().map(|e| e.kind()).collect();

    assert_eq!(kinds.iter().filter(|k| **k == "quest_missed").count(), 5);
    assert_eq!(kinds.iter().filter(|k| **k == "strike_recorded").count(), 5);
    let fatigue = kinds.iter().position(|k| *k == "shadow_fatigue_applied").unwrap();
    let curse = kinds.iter().position(|k| *k == "curse_activated").unwrap();
    let spawn = kinds.iter().position(|k| *k == "recovery_quest_spawned").unwrap();
    assert!(fatigue < curse && curse < spawn);
}

#[test]
fn test_configured_curse_multiplier() {
    let clock = ManualClock::new(ts("2024-01-03T10:00:00Z"));
    let mut config = RulesConfig::default();
    config.set_value("penalty.curse_multiplier", "0.25").unwrap();
    let mut engine = GameEngine::new("Jin", Arc::new(clock.clone()), MemoryStore::new(), config);

    miss_dailies(&mut engine, &clock, 5);
    assert_eq!(engine.add_exp(100).effective, 25);
}
