//! Trailing-day window filter.
//!
//! Comparison happens on calendar dates in a fixed offset, not on durations:
//! an artifact created at 00:01 counts for its whole day.

use chrono::{DateTime, Days, FixedOffset, NaiveDate, Offset, Utc};

use crate::resolver::ObjectRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowFilter {
    days: u32,
    offset: FixedOffset,
}

impl WindowFilter {
    /// Window of `days` calendar days, dates taken in UTC.
    pub fn new(days: u32) -> Self {
        Self::with_offset(days, Utc.fix())
    }

    pub fn with_offset(days: u32, offset: FixedOffset) -> Self {
        Self { days, offset }
    }

    /// Oldest calendar date still inside the window.
    pub fn cutoff(&self, now: DateTime<Utc>) -> NaiveDate {
        let today = now.with_timezone(&self.offset).date_naive();
        // Saturates at the earliest representable date for absurd windows.
        today
            .checked_sub_days(Days::new(u64::from(self.days)))
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn includes(&self, created: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        created.with_timezone(&self.offset).date_naive() >= self.cutoff(now)
    }

    pub fn includes_ref(&self, object: &ObjectRef, now: DateTime<Utc>) -> bool {
        self.includes(object.created, now)
    }
}

/// `include(ref, days, now)` with dates taken in UTC.
pub fn include(object: &ObjectRef, days: u32, now: DateTime<Utc>) -> bool {
    WindowFilter::new(days).includes_ref(object, now)
}
