//! Daily win flags and login streak arithmetic.
//!
//! Daily wins are four fixed categories that can each be claimed once per
//! local day. The streak counts consecutive days with recorded activity.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four self-improvement categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DailyWinCategory {
    Mental,
    Physical,
    Spiritual,
    Intelligence,
}

impl DailyWinCategory {
    pub const ALL: [DailyWinCategory; 4] = [
        DailyWinCategory::Mental,
        DailyWinCategory::Physical,
        DailyWinCategory::Spiritual,
        DailyWinCategory::Intelligence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DailyWinCategory::Mental => "mental",
            DailyWinCategory::Physical => "physical",
            DailyWinCategory::Spiritual => "spiritual",
            DailyWinCategory::Intelligence => "intelligence",
        }
    }
}

impl fmt::Display for DailyWinCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DailyWinCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DailyWinCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown daily win category '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyWins {
    pub mental: bool,
    pub physical: bool,
    pub spiritual: bool,
    pub intelligence: bool,
}

impl DailyWins {
    pub fn is_completed(&self, category: DailyWinCategory) -> bool {
        match category {
            DailyWinCategory::Mental => self.mental,
            DailyWinCategory::Physical => self.physical,
            DailyWinCategory::Spiritual => self.spiritual,
            DailyWinCategory::Intelligence => self.intelligence,
        }
    }

    pub fn all_completed(&self) -> bool {
        DailyWinCategory::ALL.iter().all(|c| self.is_completed(*c))
    }

    pub fn completed_count(&self) -> usize {
        DailyWinCategory::ALL
            .iter()
            .filter(|c| self.is_completed(**c))
            .count()
    }

    /// Returns `false` if the win was already claimed.
    pub fn mark(&mut self, category: DailyWinCategory) -> bool {
        let slot = match category {
            DailyWinCategory::Mental => &mut self.mental,
            DailyWinCategory::Physical => &mut self.physical,
            DailyWinCategory::Spiritual => &mut self.spiritual,
            DailyWinCategory::Intelligence => &mut self.intelligence,
        };
        let newly = !*slot;
        *slot = true;
        newly
    }

    pub fn clear(&mut self) {
        *self = DailyWins::default();
    }
}

/// Outcome of a streak update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakChange {
    /// First recorded activity
    Started,
    /// Activity yesterday; streak extended
    Extended,
    /// Already recorded today
    Unchanged,
    /// Gap of two or more days
    Reset,
}

/// Next streak value given the last activity day.
pub fn next_streak(last_day: Option<NaiveDate>, today: NaiveDate, current: u32) -> (u32, StreakChange) {
    match last_day {
        None => (1, StreakChange::Started),
        Some(last) => match (today - last).num_days() {
            0 => (current.max(1), StreakChange::Unchanged),
            1 => (current.saturating_add(1), StreakChange::Extended),
            // Clock moved backwards: leave the streak alone
            d if d < 0 => (current.max(1), StreakChange::Unchanged),
            _ => (1, StreakChange::Reset),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn mark_and_query() {
        let mut wins = DailyWins::default();
        assert!(!wins.is_completed(DailyWinCategory::Mental));
        assert!(wins.mark(DailyWinCategory::Mental));
        assert!(!wins.mark(DailyWinCategory::Mental));
        assert!(wins.is_completed(DailyWinCategory::Mental));
        assert_eq!(wins.completed_count(), 1);
        assert!(!wins.all_completed());

        for c in DailyWinCategory::ALL {
            wins.mark(c);
        }
        assert!(wins.all_completed());
        wins.clear();
        assert_eq!(wins.completed_count(), 0);
    }

    #[test]
    fn streak_first_activity() {
        assert_eq!(next_streak(None, day(1), 0), (1, StreakChange::Started));
    }

    #[test]
    fn streak_extends_from_yesterday() {
        assert_eq!(next_streak(Some(day(1)), day(2), 4), (5, StreakChange::Extended));
    }

    #[test]
    fn streak_same_day_unchanged() {
        assert_eq!(next_streak(Some(day(2)), day(2), 5), (5, StreakChange::Unchanged));
    }

    #[test]
    fn streak_resets_after_gap() {
        assert_eq!(next_streak(Some(day(1)), day(3), 9), (1, StreakChange::Reset));
    }

    #[test]
    fn category_parsing() {
        assert_eq!(
            "Intelligence".parse::<DailyWinCategory>(),
            Ok(DailyWinCategory::Intelligence)
        );
        assert!("social".parse::<DailyWinCategory>().is_err());
    }
}
