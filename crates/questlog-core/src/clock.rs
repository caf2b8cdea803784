//! Time source and calendar-day arithmetic.
//!
//! The engine never calls `Utc::now()` directly; every deadline comparison
//! and day/week boundary goes through a [`Clock`] so tests can pin time.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

/// Supplies the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock. Clones share the same instant, so a test can keep
/// one handle while the engine owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(start)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
        *guard = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Maps instants onto the user's local calendar.
///
/// Days run from 00:00:00 to 23:59:59 local time; weeks start on Sunday.
#[derive(Debug, Clone, Copy)]
pub struct DayBoundary {
    offset: FixedOffset,
}

impl DayBoundary {
    /// Offsets outside ±24h fall back to UTC.
    pub fn from_offset_minutes(minutes: i32) -> Self {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// Last second of `day` in local time, as a UTC instant.
    pub fn end_of_day(&self, day: NaiveDate) -> DateTime<Utc> {
        let next_midnight = (day + Duration::days(1)).and_time(NaiveTime::MIN);
        let local_end = next_midnight - Duration::seconds(1);
        let utc_naive = local_end - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&utc_naive)
    }

    /// The Sunday that opens the week containing `day`.
    pub fn week_start(&self, day: NaiveDate) -> NaiveDate {
        day - Duration::days(i64::from(day.weekday().num_days_from_sunday()))
    }
}

impl Default for DayBoundary {
    fn default() -> Self {
        Self::utc()
    }
}
