//! Reset scheduler.
//!
//! Pure boundary detection. The caller invokes [`ResetScheduler::plan`]
//! from whatever drives it (a timer, a visibility change, a test) and the
//! engine executes the returned plan. No rules live here.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::DayBoundary;

/// Last boundaries the engine acted on. Persisted with the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetMarks {
    pub last_daily_reset: Option<NaiveDate>,
    pub last_weekly_reset: Option<NaiveDate>,
    pub last_curse_check: Option<DateTime<Utc>>,
}

/// Which boundaries fired for a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickPlan {
    pub today: NaiveDate,
    pub week_start: NaiveDate,
    pub day_rolled: bool,
    pub week_rolled: bool,
    pub curse_check_due: bool,
}

impl TickPlan {
    pub fn is_idle(&self) -> bool {
        !(self.day_rolled || self.week_rolled || self.curse_check_due)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResetScheduler {
    boundary: DayBoundary,
    curse_check_interval: Duration,
}

impl ResetScheduler {
    pub fn new(boundary: DayBoundary, curse_check_interval: Duration) -> Self {
        Self {
            boundary,
            curse_check_interval,
        }
    }

    pub fn boundary(&self) -> &DayBoundary {
        &self.boundary
    }

    /// Boundaries crossed since `marks` were recorded. A missing mark counts
    /// as crossed.
    pub fn plan(&self, marks: &ResetMarks, now: DateTime<Utc>) -> TickPlan {
        let today = self.boundary.day_of(now);
        let week_start = self.boundary.week_start(today);
        // A day rollover always re-runs the deadline sweep, so it implies a
        // curse check too.
        let day_rolled = marks.last_daily_reset != Some(today);
        let curse_check_due = day_rolled
            || marks
                .last_curse_check
                .map_or(true, |last| now - last >= self.curse_check_interval);

        TickPlan {
            today,
            week_start,
            day_rolled,
            week_rolled: marks.last_weekly_reset != Some(week_start),
            curse_check_due,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn scheduler() -> ResetScheduler {
        ResetScheduler::new(DayBoundary::utc(), Duration::minutes(5))
    }

    fn marks_at(now: DateTime<Utc>) -> ResetMarks {
        let s = scheduler();
        let today = s.boundary().day_of(now);
        ResetMarks {
            last_daily_reset: Some(today),
            last_weekly_reset: Some(s.boundary().week_start(today)),
            last_curse_check: Some(now),
        }
    }

    #[test]
    fn fresh_marks_fire_everything() {
        let plan = scheduler().plan(&ResetMarks::default(), ts("2024-01-03T10:00:00Z"));
        assert!(plan.day_rolled);
        assert!(plan.week_rolled);
        assert!(plan.curse_check_due);
    }

    #[test]
    fn same_minute_is_idle() {
        let now = ts("2024-01-03T10:00:00Z");
        let plan = scheduler().plan(&marks_at(now), now + Duration::seconds(30));
        assert!(plan.is_idle());
    }

    #[test]
    fn curse_check_every_five_minutes() {
        let now = ts("2024-01-03T10:00:00Z");
        let plan = scheduler().plan(&marks_at(now), now + Duration::minutes(5));
        assert!(plan.curse_check_due);
        assert!(!plan.day_rolled);
    }

    #[test]
    fn midnight_rolls_day_not_week() {
        // Wednesday -> Thursday
        let now = ts("2024-01-03T23:59:00Z");
        let plan = scheduler().plan(&marks_at(now), ts("2024-01-04T00:00:01Z"));
        assert!(plan.day_rolled);
        assert!(plan.curse_check_due);
        assert!(!plan.week_rolled);
    }

    #[test]
    fn sunday_rolls_week() {
        // Saturday -> Sunday
        let now = ts("2024-01-06T23:00:00Z");
        let plan = scheduler().plan(&marks_at(now), ts("2024-01-07T00:00:01Z"));
        assert!(plan.week_rolled);
        assert_eq!(plan.week_start, NaiveDate::from_ymd_opt(2024, 1, 7).unwrap());
    }
}
