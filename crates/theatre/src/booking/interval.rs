use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Both intervals are projected onto this day before comparing. An interval that
/// runs past midnight keeps extending into the following day instead of wrapping
/// back to the early morning.
const ANCHOR_DAY: NaiveDate = match NaiveDate::from_ymd_opt(2000, 1, 1) {
    Some(day) => day,
    None => panic!("anchor day is a valid calendar date"),
};

/// A time-of-day start plus a duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: NaiveTime,
    pub duration: Duration,
}

impl Interval {
    pub fn new(start: NaiveTime, duration: Duration) -> Self {
        Self { start, duration }
    }

    fn anchored(&self) -> (NaiveDateTime, NaiveDateTime) {
        let start = ANCHOR_DAY.and_time(self.start);
        let end = start
            .checked_add_signed(self.duration)
            .unwrap_or(NaiveDateTime::MAX);
        (start, end)
    }

    /// True when the two intervals share a positive amount of time. Touching
    /// intervals, where one ends exactly when the other starts, do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        let (start_a, end_a) = self.anchored();
        let (start_b, end_b) = other.anchored();

        let latest_start = start_a.max(start_b);
        let earliest_end = end_a.min(end_b);

        earliest_end - latest_start > Duration::zero()
    }
}

pub fn overlaps(a: &Interval, b: &Interval) -> bool {
    a.overlaps(b)
}
