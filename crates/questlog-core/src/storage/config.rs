//! TOML-based rules configuration.
//!
//! Stores the tunable numbers of the rules engine:
//! - Level curve and per-stat level step
//! - Gold conversion rate
//! - Penalty multipliers and fatigue threshold
//! - Local day offset and curse-check cadence
//! - Planner caps and the Recovery Quest template
//!
//! Configuration is stored at `~/.config/questlog/rules.toml`.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::clock::DayBoundary;
use crate::error::ConfigError;
use crate::penalty::{PenaltyRates, MAX_STRIKES};
use crate::progression::{GoldPolicy, LevelCurve};

const FILE_NAME: &str = "rules.toml";

/// Upper bound for `schedule.curse_check_interval_secs` (one week).
pub const MAX_CURSE_CHECK_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionConfig {
    #[serde(default = "default_base_exp")]
    pub base_exp: u64,
    #[serde(default = "default_growth_exponent")]
    pub growth_exponent: f64,
    #[serde(default = "default_stat_exp_per_level")]
    pub stat_exp_per_level: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldConfig {
    #[serde(default = "default_exp_ratio")]
    pub exp_ratio: f64,
    #[serde(default = "default_rank_bonus")]
    pub rank_bonus: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyConfig {
    #[serde(default = "default_fatigue_threshold")]
    pub fatigue_threshold: u8,
    #[serde(default = "default_curse_multiplier")]
    pub curse_multiplier: f64,
    #[serde(default = "default_fatigue_multiplier")]
    pub fatigue_multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Minutes east of UTC used to decide where a day begins
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_curse_check_interval_secs")]
    pub curse_check_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_attribute_tasks_per_day")]
    pub attribute_tasks_per_day: usize,
}

/// Template for the quest spawned when a curse activates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    #[serde(default = "default_recovery_title")]
    pub title: String,
    #[serde(default = "default_recovery_description")]
    pub description: String,
    #[serde(default = "default_recovery_exp_reward")]
    pub exp_reward: u64,
    #[serde(default = "default_recovery_tasks")]
    pub tasks: Vec<String>,
}

/// Rules configuration.
///
/// Serialized to/from TOML at `~/.config/questlog/rules.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default)]
    pub progression: ProgressionConfig,
    #[serde(default)]
    pub gold: GoldConfig,
    #[serde(default)]
    pub penalty: PenaltyConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
}

// Default functions
fn default_base_exp() -> u64 {
    100
}
fn default_growth_exponent() -> f64 {
    1.5
}
fn default_stat_exp_per_level() -> u32 {
    100
}
fn default_exp_ratio() -> f64 {
    0.1
}
fn default_rank_bonus() -> f64 {
    0.1
}
fn default_fatigue_threshold() -> u8 {
    3
}
fn default_curse_multiplier() -> f64 {
    0.5
}
fn default_fatigue_multiplier() -> f64 {
    0.75
}
fn default_curse_check_interval_secs() -> u64 {
    300
}
fn default_attribute_tasks_per_day() -> usize {
    5
}
fn default_recovery_title() -> String {
    "Recovery Quest: Break the Curse".into()
}
fn default_recovery_description() -> String {
    "Prove your resolve. Finish every step to lift the curse.".into()
}
fn default_recovery_exp_reward() -> u64 {
    50
}
fn default_recovery_tasks() -> Vec<String> {
    vec![
        "Complete a 30-minute workout".into(),
        "Meditate for 15 minutes".into(),
        "Write tomorrow's plan".into(),
    ]
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            base_exp: default_base_exp(),
            growth_exponent: default_growth_exponent(),
            stat_exp_per_level: default_stat_exp_per_level(),
        }
    }
}

impl Default for GoldConfig {
    fn default() -> Self {
        Self {
            exp_ratio: default_exp_ratio(),
            rank_bonus: default_rank_bonus(),
        }
    }
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            fatigue_threshold: default_fatigue_threshold(),
            curse_multiplier: default_curse_multiplier(),
            fatigue_multiplier: default_fatigue_multiplier(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            curse_check_interval_secs: default_curse_check_interval_secs(),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            attribute_tasks_per_day: default_attribute_tasks_per_day(),
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            title: default_recovery_title(),
            description: default_recovery_description(),
            exp_reward: default_recovery_exp_reward(),
            tasks: default_recovery_tasks(),
        }
    }
}

impl RulesConfig {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::InvalidValue {
            key: key.to_string(),
            message: "unknown config key".into(),
        };
        let bad_value = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| bad_value(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| bad_value(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(bad_value(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| bad_value(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from(FILE_NAME),
            message: e.to_string(),
        })?;
        Ok(dir.join(FILE_NAME))
    }

    /// Load from the data directory, writing defaults if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed or fails
    /// validation, or if the default config cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit file, writing defaults if absent.
    ///
    /// # Errors
    ///
    /// Same as [`RulesConfig::load`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: RulesConfig = toml::from_str(&content)?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default rules");
            Self::default()
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value in memory by key, keeping the previous config if the
    /// result does not validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the resulting config is invalid.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let parse_failed = |e: serde_json::Error| ConfigError::ParseFailed(e.to_string());
        let mut json = serde_json::to_value(&*self).map_err(parse_failed)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: RulesConfig = serde_json::from_value(json).map_err(|e| {
            ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a value by key and persist.
    ///
    /// # Errors
    ///
    /// Same as [`RulesConfig::set_value`], plus save failures.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Reject values that would break engine invariants.
    ///
    /// # Errors
    ///
    /// Returns the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| -> Result<(), ConfigError> {
            Err(ConfigError::InvalidValue {
                key: key.into(),
                message: message.into(),
            })
        };
        let in_unit_range = |m: f64| m > 0.0 && m <= 1.0;

        if self.progression.base_exp < 10 {
            return invalid("progression.base_exp", "must be at least 10");
        }
        if !(self.progression.growth_exponent >= 1.0 && self.progression.growth_exponent <= 4.0) {
            return invalid("progression.growth_exponent", "must be between 1.0 and 4.0");
        }
        if self.progression.stat_exp_per_level == 0 {
            return invalid("progression.stat_exp_per_level", "must be positive");
        }
        if !(self.gold.exp_ratio >= 0.0 && self.gold.rank_bonus >= 0.0) {
            return invalid("gold", "rates must be non-negative");
        }
        if !in_unit_range(self.penalty.curse_multiplier) {
            return invalid("penalty.curse_multiplier", "must be in (0, 1]");
        }
        if !in_unit_range(self.penalty.fatigue_multiplier) {
            return invalid("penalty.fatigue_multiplier", "must be in (0, 1]");
        }
        if self.penalty.fatigue_threshold == 0 || self.penalty.fatigue_threshold > MAX_STRIKES {
            return invalid("penalty.fatigue_threshold", "must be between 1 and 5");
        }
        if self.schedule.utc_offset_minutes.abs() > 18 * 60 {
            return invalid("schedule.utc_offset_minutes", "must be within ±18 hours");
        }
        if self.schedule.curse_check_interval_secs == 0
            || self.schedule.curse_check_interval_secs > MAX_CURSE_CHECK_INTERVAL_SECS
        {
            return invalid(
                "schedule.curse_check_interval_secs",
                "must be between 1 second and 7 days",
            );
        }
        if self.planner.attribute_tasks_per_day == 0 {
            return invalid("planner.attribute_tasks_per_day", "must be positive");
        }
        if self.recovery.exp_reward == 0 {
            return invalid("recovery.exp_reward", "must be positive");
        }
        Ok(())
    }

    pub fn level_curve(&self) -> LevelCurve {
        LevelCurve::new(self.progression.base_exp, self.progression.growth_exponent)
    }

    pub fn gold_policy(&self) -> GoldPolicy {
        GoldPolicy {
            exp_ratio: self.gold.exp_ratio,
            rank_bonus: self.gold.rank_bonus,
        }
    }

    pub fn penalty_rates(&self) -> PenaltyRates {
        PenaltyRates {
            curse_multiplier: self.penalty.curse_multiplier,
            fatigue_multiplier: self.penalty.fatigue_multiplier,
            fatigue_threshold: self.penalty.fatigue_threshold,
        }
    }

    pub fn day_boundary(&self) -> DayBoundary {
        DayBoundary::from_offset_minutes(self.schedule.utc_offset_minutes)
    }

    /// Clamped to [`MAX_CURSE_CHECK_INTERVAL_SECS`] for configs built
    /// without [`RulesConfig::validate`].
    pub fn curse_check_interval(&self) -> Duration {
        let secs = self
            .schedule
            .curse_check_interval_secs
            .min(MAX_CURSE_CHECK_INTERVAL_SECS);
        Duration::try_seconds(secs as i64).unwrap_or_else(|| Duration::days(7))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = RulesConfig::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: RulesConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.progression.base_exp, 100);
        assert_eq!(parsed.penalty.curse_multiplier, 0.5);
        assert_eq!(parsed.recovery.tasks.len(), 3);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: RulesConfig = toml::from_str("[penalty]\nfatigue_threshold = 4\n").unwrap();
        assert_eq!(parsed.penalty.fatigue_threshold, 4);
        assert_eq!(parsed.penalty.fatigue_multiplier, 0.75);
        assert_eq!(parsed.schedule.curse_check_interval_secs, 300);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = RulesConfig::default();
        assert_eq!(cfg.get("progression.base_exp").as_deref(), Some("100"));
        assert_eq!(cfg.get("penalty.curse_multiplier").as_deref(), Some("0.5"));
        assert!(cfg.get("penalty.missing_key").is_none());
    }

    #[test]
    fn set_value_updates_nested_number() {
        let mut cfg = RulesConfig::default();
        cfg.set_value("schedule.utc_offset_minutes", "-300").unwrap();
        assert_eq!(cfg.schedule.utc_offset_minutes, -300);
        cfg.set_value("penalty.fatigue_multiplier", "0.8").unwrap();
        assert_eq!(cfg.penalty.fatigue_multiplier, 0.8);
    }

    #[test]
    fn set_value_updates_string_and_array() {
        let mut cfg = RulesConfig::default();
        cfg.set_value("recovery.title", "Atonement").unwrap();
        assert_eq!(cfg.recovery.title, "Atonement");
        cfg.set_value("recovery.tasks", r#"["Walk 5km"]"#).unwrap();
        assert_eq!(cfg.recovery.tasks, vec!["Walk 5km".to_string()]);
    }

    #[test]
    fn set_value_rejects_unknown_key() {
        let mut cfg = RulesConfig::default();
        assert!(cfg.set_value("penalty.nonexistent", "1").is_err());
        assert!(cfg.set_value("", "1").is_err());
    }

    #[test]
    fn set_value_rejects_invalid_result() {
        let mut cfg = RulesConfig::default();
        let err = cfg.set_value("penalty.curse_multiplier", "1.5").unwrap_err();
        assert!(err.to_string().contains("penalty.curse_multiplier"));
        // Unchanged on failure
        assert_eq!(cfg.penalty.curse_multiplier, 0.5);
        assert!(cfg.set_value("progression.base_exp", "not_a_number").is_err());
    }

    #[test]
    fn load_from_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        let cfg = RulesConfig::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.planner.attribute_tasks_per_day, 5);

        let mut changed = cfg.clone();
        changed.set_value("planner.attribute_tasks_per_day", "3").unwrap();
        changed.save_to(&path).unwrap();
        let reloaded = RulesConfig::load_from(&path).unwrap();
        assert_eq!(reloaded.planner.attribute_tasks_per_day, 3);
    }

    #[test]
    fn load_from_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        std::fs::write(&path, "[progression]\ngrowth_exponent = 0.5\n").unwrap();
        assert!(RulesConfig::load_from(&path).is_err());
    }

    #[test]
    fn set_value_rejects_oversized_curse_check_interval() {
        let mut cfg = RulesConfig::default();
        let err = cfg
            .set_value("schedule.curse_check_interval_secs", "9223372036854775807")
            .unwrap_err();
        assert!(err.to_string().contains("schedule.curse_check_interval_secs"));
        assert_eq!(cfg.schedule.curse_check_interval_secs, 300);

        cfg.set_value("schedule.curse_check_interval_secs", "604800").unwrap();
        assert_eq!(cfg.curse_check_interval(), Duration::days(7));
        assert!(cfg.set_value("schedule.curse_check_interval_secs", "604801").is_err());
    }

    #[test]
    fn curse_check_interval_clamps_unvalidated_values() {
        let mut cfg = RulesConfig::default();
        cfg.schedule.curse_check_interval_secs = u64::MAX;
        assert_eq!(cfg.curse_check_interval(), Duration::days(7));
    }

    #[test]
    fn load_from_keeps_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        let original = b"[penalty]\nfatigue_threshold = 4\n# \xff\xfe\n";
        std::fs::write(&path, original).unwrap();

        let err = RulesConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::LoadFailed { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), original);
    }

    #[test]
    fn derived_policies() {
        let cfg = RulesConfig::default();
        assert_eq!(cfg.level_curve().exp_to_next(1), 100);
        assert_eq!(cfg.penalty_rates().fatigue_threshold, 3);
        assert_eq!(cfg.curse_check_interval(), Duration::minutes(5));
    }
}
