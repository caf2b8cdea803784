//! Progression calculator.
//!
//! Converts EXP into levels and ranks, derives gold from quest rewards,
//! and levels individual stats. All arithmetic is integer after the
//! penalty multiplier has been floored.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::user::{StatKind, User};

/// Cosmetic tier derived from level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    F,
    E,
    D,
    C,
    B,
    A,
    S,
    SS,
    SSS,
}

/// Minimum level for each rank, highest first.
const RANK_THRESHOLDS: [(u32, Rank); 9] = [
    (200, Rank::SSS),
    (150, Rank::SS),
    (100, Rank::S),
    (80, Rank::A),
    (60, Rank::B),
    (40, Rank::C),
    (25, Rank::D),
    (15, Rank::E),
    (1, Rank::F),
];

impl Rank {
    pub fn for_level(level: u32) -> Rank {
        RANK_THRESHOLDS
            .iter()
            .find(|(min, _)| level >= *min)
            .map(|(_, rank)| *rank)
            .unwrap_or(Rank::F)
    }

    /// Lowest level that carries this rank.
    pub fn min_level(&self) -> u32 {
        RANK_THRESHOLDS
            .iter()
            .find(|(_, rank)| rank == self)
            .map(|(min, _)| *min)
            .unwrap_or(1)
    }

    /// 0 for F up to 8 for SSS.
    pub fn tier(&self) -> u32 {
        *self as u32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::F => "F",
            Rank::E => "E",
            Rank::D => "D",
            Rank::C => "C",
            Rank::B => "B",
            Rank::A => "A",
            Rank::S => "S",
            Rank::SS => "SS",
            Rank::SSS => "SSS",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// EXP required to clear a level: `floor(base_exp × level^growth_exponent)`.
///
/// Strictly increasing in `level` for `base_exp ≥ 10` and `growth_exponent ≥ 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelCurve {
    pub base_exp: u64,
    pub growth_exponent: f64,
}

impl LevelCurve {
    pub fn new(base_exp: u64, growth_exponent: f64) -> Self {
        Self {
            base_exp,
            growth_exponent,
        }
    }

    pub fn exp_to_next(&self, level: u32) -> u64 {
        let level = f64::from(level.max(1));
        let raw = self.base_exp as f64 * level.powf(self.growth_exponent);
        (raw.floor() as u64).max(1)
    }
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self::new(100, 1.5)
    }
}

/// Gold paid out alongside a quest reward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoldPolicy {
    /// Gold per raw EXP of the reward
    pub exp_ratio: f64,
    /// Extra fraction per rank tier above F
    pub rank_bonus: f64,
}

impl GoldPolicy {
    /// Gold is computed from the raw reward; penalty multipliers do not apply.
    pub fn gold_for(&self, raw_exp: u64, rank: Rank) -> u64 {
        let bonus = 1.0 + f64::from(rank.tier()) * self.rank_bonus;
        (raw_exp as f64 * self.exp_ratio * bonus).floor().max(0.0) as u64
    }
}

impl Default for GoldPolicy {
    fn default() -> Self {
        Self {
            exp_ratio: 0.1,
            rank_bonus: 0.1,
        }
    }
}

/// Applies the penalty multiplier and floors.
pub fn effective_exp(raw: u64, multiplier: f64) -> u64 {
    (raw as f64 * multiplier).floor().max(0.0) as u64
}

/// Result of crediting EXP to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpGain {
    pub raw: u64,
    pub effective: u64,
    pub multiplier: f64,
    pub level_before: u32,
    pub level_after: u32,
    pub rank_before: Rank,
    pub rank_after: Rank,
}

impl ExpGain {
    pub fn levels_gained(&self) -> u32 {
        self.level_after - self.level_before
    }

    pub fn rank_changed(&self) -> bool {
        self.rank_before != self.rank_after
    }
}

/// Result of crediting EXP to one stat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatGain {
    pub stat: StatKind,
    pub amount: u32,
    pub level_before: u32,
    pub level_after: u32,
    pub exp: u32,
}

impl User {
    /// Credit `raw × multiplier` EXP, converting overflow into level-ups.
    pub fn add_exp(&mut self, raw: u64, multiplier: f64, curve: &LevelCurve) -> ExpGain {
        let effective = effective_exp(raw, multiplier);
        let level_before = self.level;
        let rank_before = self.rank;

        self.exp = self.exp.saturating_add(effective);
        while self.exp >= self.exp_to_next_level {
            self.exp -= self.exp_to_next_level;
            self.level += 1;
            self.exp_to_next_level = curve.exp_to_next(self.level);
        }
        self.rank = Rank::for_level(self.level);

        ExpGain {
            raw,
            effective,
            multiplier,
            level_before,
            level_after: self.level,
            rank_before,
            rank_after: self.rank,
        }
    }

    pub fn add_gold(&mut self, amount: u64) -> u64 {
        self.gold = self.gold.saturating_add(amount);
        self.gold
    }

    /// Stat EXP is never penalized; every `per_level` EXP is one stat level.
    pub fn increase_stat(&mut self, stat: StatKind, amount: u32, per_level: u32) -> StatGain {
        let per_level = per_level.max(1);
        let block = self.stats.get_mut(stat);
        let level_before = block.level;

        block.exp = block.exp.saturating_add(amount);
        while block.exp >= per_level {
            block.exp -= per_level;
            block.level += 1;
        }

        StatGain {
            stat,
            amount,
            level_before,
            level_after: block.level,
            exp: block.exp,
        }
    }
}
