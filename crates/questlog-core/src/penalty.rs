//! Penalty and curse engine.
//!
//! Missed deadlines within a week accrue strikes on a chance counter:
//!
//! ```text
//! Safe (0-1) -> Warning (2-3) -> Danger (4) -> Cursed (5)
//! ```
//!
//! A curse halves EXP gains until a Recovery Quest is completed or the
//! Sunday boundary resets the week. Shadow Fatigue is a milder, separate
//! flag; when both are set the curse multiplier wins.

use serde::{Deserialize, Serialize};

/// Strikes that trigger a curse.
pub const MAX_STRIKES: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PenaltyLevel {
    Safe,
    Warning,
    Danger,
    Cursed,
}

impl PenaltyLevel {
    pub fn from_strikes(strikes: u8) -> Self {
        match strikes {
            0..=1 => PenaltyLevel::Safe,
            2..=3 => PenaltyLevel::Warning,
            4 => PenaltyLevel::Danger,
            _ => PenaltyLevel::Cursed,
        }
    }
}

/// EXP multipliers applied under penalties.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenaltyRates {
    pub curse_multiplier: f64,
    pub fatigue_multiplier: f64,
    /// Strike count at which Shadow Fatigue sets in
    pub fatigue_threshold: u8,
}

impl Default for PenaltyRates {
    fn default() -> Self {
        Self {
            curse_multiplier: 0.5,
            fatigue_multiplier: 0.75,
            fatigue_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyState {
    pub chance_counter: u8,
    pub is_cursed: bool,
    pub has_shadow_fatigue: bool,
    /// Mirrors whether an uncompleted Recovery Quest exists while cursed
    pub can_use_redemption: bool,
}

/// What a single strike changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrikeOutcome {
    pub chance_counter: u8,
    pub became_cursed: bool,
    pub became_fatigued: bool,
}

impl PenaltyState {
    pub fn level(&self) -> PenaltyLevel {
        if self.is_cursed {
            PenaltyLevel::Cursed
        } else {
            PenaltyLevel::from_strikes(self.chance_counter)
        }
    }

    /// Curse dominates fatigue; the two never stack.
    pub fn multiplier(&self, rates: &PenaltyRates) -> f64 {
        if self.is_cursed {
            rates.curse_multiplier
        } else if self.has_shadow_fatigue {
            rates.fatigue_multiplier
        } else {
            1.0
        }
    }

    /// Record one missed deadline.
    pub fn record_strike(&mut self, rates: &PenaltyRates) -> StrikeOutcome {
        self.chance_counter = self.chance_counter.saturating_add(1).min(MAX_STRIKES);

        let became_cursed = !self.is_cursed && self.chance_counter >= MAX_STRIKES;
        if became_cursed {
            self.is_cursed = true;
        }

        let became_fatigued = !self.is_cursed
            && !self.has_shadow_fatigue
            && self.chance_counter >= rates.fatigue_threshold;
        if became_fatigued {
            self.has_shadow_fatigue = true;
        }

        StrikeOutcome {
            chance_counter: self.chance_counter,
            became_cursed,
            became_fatigued,
        }
    }

    /// Completing the Recovery Quest. Lost EXP is not restored.
    pub fn lift_curse(&mut self) {
        self.chance_counter = 0;
        self.is_cursed = false;
        self.has_shadow_fatigue = false;
        self.can_use_redemption = false;
    }

    /// Any completed quest clears fatigue. Returns whether it was set.
    pub fn clear_fatigue(&mut self) -> bool {
        std::mem::replace(&mut self.has_shadow_fatigue, false)
    }

    /// Sunday boundary: unconditional.
    pub fn weekly_reset(&mut self) {
        self.lift_curse();
    }
}
