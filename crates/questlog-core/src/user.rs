//! The player record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::daily_wins::DailyWins;
use crate::progression::{LevelCurve, Rank};

/// Attribute a stat-level belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatKind {
    Physical,
    Cognitive,
    Emotional,
    Spiritual,
    Social,
}

impl StatKind {
    pub const ALL: [StatKind; 5] = [
        StatKind::Physical,
        StatKind::Cognitive,
        StatKind::Emotional,
        StatKind::Spiritual,
        StatKind::Social,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatKind::Physical => "physical",
            StatKind::Cognitive => "cognitive",
            StatKind::Emotional => "emotional",
            StatKind::Spiritual => "spiritual",
            StatKind::Social => "social",
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StatKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown stat '{s}'"))
    }
}

/// Level and in-level EXP of a single stat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatBlock {
    pub level: u32,
    pub exp: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub physical: StatBlock,
    pub cognitive: StatBlock,
    pub emotional: StatBlock,
    pub spiritual: StatBlock,
    pub social: StatBlock,
}

impl Stats {
    pub fn get(&self, kind: StatKind) -> &StatBlock {
        match kind {
            StatKind::Physical => &self.physical,
            StatKind::Cognitive => &self.cognitive,
            StatKind::Emotional => &self.emotional,
            StatKind::Spiritual => &self.spiritual,
            StatKind::Social => &self.social,
        }
    }

    pub fn get_mut(&mut self, kind: StatKind) -> &mut StatBlock {
        match kind {
            StatKind::Physical => &mut self.physical,
            StatKind::Cognitive => &mut self.cognitive,
            StatKind::Emotional => &mut self.emotional,
            StatKind::Spiritual => &mut self.spiritual,
            StatKind::Social => &mut self.social,
        }
    }
}

/// The player aggregate root.
///
/// `rank` is always derived from `level`; `exp` is kept below
/// `exp_to_next_level` by the progression calculator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    /// Cosmetic title shown next to the name
    #[serde(default)]
    pub title: Option<String>,
    pub level: u32,
    pub exp: u64,
    pub exp_to_next_level: u64,
    pub gold: u64,
    pub rank: Rank,
    pub stats: Stats,
    pub streak_days: u32,
    pub longest_streak: u32,
    pub last_login: Option<DateTime<Utc>>,
    pub daily_wins: DailyWins,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>, curve: &LevelCurve, created_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            title: None,
            level: 1,
            exp: 0,
            exp_to_next_level: curve.exp_to_next(1),
            gold: 0,
            rank: Rank::for_level(1),
            stats: Stats::default(),
            streak_days: 0,
            longest_streak: 0,
            last_login: None,
            daily_wins: DailyWins::default(),
            created_at,
        }
    }

    /// Apply a profile patch. Only cosmetic fields are patchable.
    pub fn apply_patch(&mut self, patch: UserPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(title) = patch.title {
            self.title = if title.is_empty() { None } else { Some(title) };
        }
    }
}

/// Partial update for [`User`] profile fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPatch {
    pub name: Option<String>,
    /// `Some("")` clears the title
    pub title: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.title.is_none()
    }
}
