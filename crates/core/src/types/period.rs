//! Calendar ranges and overlap rules.
//!
//! Bookings occupy whole days ([`DateRange`]); maintenance windows may carry
//! optional times of day ([`TimedRange`]). Invoice periods are calendar
//! months ([`MonthPeriod`]).

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Errors raised when constructing a range.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PeriodError {
    #[error("end date must be on or after start date")]
    EndBeforeStart,
    #[error("start time and end time must be provided together")]
    UnpairedTime,
    #[error("end time must be after start time on the same day")]
    EndTimeNotAfterStart,
    #[error("invalid month: {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },
}

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// # Errors
    ///
    /// Returns [`PeriodError::EndBeforeStart`] if `end < start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PeriodError> {
        if end < start {
            return Err(PeriodError::EndBeforeStart);
        }
        Ok(Self { start, end })
    }

    /// A range with an optional end. A missing end runs to the last
    /// representable day.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError::EndBeforeStart`] if `end < start`.
    pub fn open_ended(start: NaiveDate, end: Option<NaiveDate>) -> Result<Self, PeriodError> {
        Self::new(start, end.unwrap_or(NaiveDate::MAX))
    }

    #[must_use]
    pub fn is_open_ended(&self) -> bool {
        self.end == NaiveDate::MAX
    }

    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Inclusive overlap: ranges sharing a single day overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// `dd/MM/yyyy - dd/MM/yyyy`, as shown in booking conflict messages.
    #[must_use]
    pub fn display_vn(&self) -> String {
        format!(
            "{} - {}",
            self.start.format("%d/%m/%Y"),
            self.end.format("%d/%m/%Y")
        )
    }
}

/// A maintenance window: a date range with optional times of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

impl TimedRange {
    /// Build a validated window.
    ///
    /// # Errors
    ///
    /// - `EndBeforeStart` if `end_date < start_date`
    /// - `UnpairedTime` if only one of the times is given
    /// - `EndTimeNotAfterStart` on a single-day window whose end time is not
    ///   after its start time
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        start_time: Option<NaiveTime>,
        end_time: Option<NaiveTime>,
    ) -> Result<Self, PeriodError> {
        if end_date < start_date {
            return Err(PeriodError::EndBeforeStart);
        }
        match (start_time, end_time) {
            (Some(_), None) | (None, Some(_)) => return Err(PeriodError::UnpairedTime),
            (Some(st), Some(et)) if start_date == end_date && et <= st => {
                return Err(PeriodError::EndTimeNotAfterStart);
            }
            _ => {}
        }
        Ok(Self {
            start_date,
            end_date,
            start_time,
            end_time,
        })
    }

    const fn has_any_time(&self) -> bool {
        self.start_time.is_some() || self.end_time.is_some()
    }

    /// Window start, defaulting a missing time to midnight.
    #[must_use]
    pub fn start_at(&self) -> NaiveDateTime {
        self.start_date
            .and_time(self.start_time.unwrap_or(NaiveTime::MIN))
    }

    /// Window end, defaulting a missing time to 23:59:59.
    #[must_use]
    pub fn end_at(&self) -> NaiveDateTime {
        self.end_date.and_time(self.end_time.unwrap_or(end_of_day()))
    }

    /// Whether two windows collide.
    ///
    /// Fully timed windows compare strictly, so back-to-back windows do not
    /// overlap. Date-only windows compare days inclusively. Mixed windows
    /// default the missing times and compare strictly.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        if !self.has_any_time() && !other.has_any_time() {
            return self.start_date <= other.end_date && self.end_date >= other.start_date;
        }
        self.start_at() < other.end_at() && self.end_at() > other.start_at()
    }

    /// Whether `now` falls inside the window (inclusive).
    #[must_use]
    pub fn is_active_at(&self, now: NaiveDateTime) -> bool {
        self.start_at() <= now && now <= self.end_at()
    }

    #[must_use]
    pub fn has_started(&self, now: NaiveDateTime) -> bool {
        self.start_at() <= now
    }

    #[must_use]
    pub fn has_ended(&self, now: NaiveDateTime) -> bool {
        self.end_at() < now
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

/// A calendar month, the unit of invoice period uniqueness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonthPeriod {
    year: i32,
    month: u32,
}

impl MonthPeriod {
    /// # Errors
    ///
    /// Returns [`PeriodError::InvalidMonth`] for a month outside 1..=12.
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) || NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(PeriodError::InvalidMonth { year, month });
        }
        Ok(Self { year, month })
    }

    /// The month containing `date`.
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    #[must_use]
    pub const fn month(&self) -> u32 {
        self.month
    }

    #[must_use]
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    #[must_use]
    pub fn last_day(&self) -> NaiveDate {
        let first = self.first_day();
        first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(first)
    }

    #[must_use]
    pub fn days(&self) -> u32 {
        self.last_day().day()
    }

    /// Clamp a configured generation day into this month (31 → 28 in February).
    #[must_use]
    pub fn clamp_day(&self, day: u32) -> NaiveDate {
        let day = day.clamp(1, self.days());
        NaiveDate::from_ymd_opt(self.year, self.month, day).unwrap_or_else(|| self.first_day())
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    #[must_use]
    pub fn as_range(&self) -> DateRange {
        DateRange {
            start: self.first_day(),
            end: self.last_day(),
        }
    }

    /// `yyyyMM`, used in monthly invoice numbers.
    #[must_use]
    pub fn compact(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }
}

impl core::fmt::Display for MonthPeriod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:02}/{:04}", self.month, self.year)
    }
}

/// Add calendar months, clamping to the last day of the target month.
#[must_use]
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months)).unwrap_or(date)
}

/// End date of a package booked on `start`.
///
/// Day packages with a positive duration add that many days; everything else
/// adds `month_count` calendar months.
#[must_use]
pub fn package_end_date(
    start: NaiveDate,
    unit: super::status::PeriodUnit,
    month_count: u32,
    duration_days: Option<u32>,
) -> NaiveDate {
    match (unit, duration_days) {
        (super::status::PeriodUnit::Day, Some(days)) if days > 0 => start
            .checked_add_days(chrono::Days::new(u64::from(days)))
            .unwrap_or(start),
        _ => add_months(start, month_count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    #[test]
    fn test_date_range_rejects_reversed() {
        assert_eq!(
            DateRange::new(d(2025, 3, 2), d(2025, 3, 1)),
            Err(PeriodError::EndBeforeStart)
        );
        assert!(DateRange::new(d(2025, 3, 1), d(2025, 3, 1)).is_ok());
    }

    #[test]
    fn test_date_range_overlap_is_inclusive() {
        let a = DateRange::new(d(2025, 1, 1), d(2025, 1, 10)).expect("range");
        let b = DateRange::new(d(2025, 1, 10), d(2025, 1, 20)).expect("range");
        let c = DateRange::new(d(2025, 1, 11), d(2025, 1, 20)).expect("range");
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(a.contains(d(2025, 1, 10)));
        assert_eq!(a.display_vn(), "01/01/2025 - 10/01/2025");
    }

    #[test]
    fn test_open_ended_range_overlaps_everything_after_start() {
        let open = DateRange::open_ended(d(2025, 1, 1), None).expect("range");
        assert!(open.is_open_ended());
        assert!(open.contains(d(2099, 12, 31)));

        let later = DateRange::new(d(2030, 6, 1), d(2030, 6, 30)).expect("range");
        assert!(open.overlaps(&later));
        let earlier = DateRange::new(d(2024, 1, 1), d(2024, 12, 31)).expect("range");
        assert!(!open.overlaps(&earlier));

        let closed = DateRange::open_ended(d(2025, 1, 1), Some(d(2025, 3, 31))).expect("range");
        assert!(!closed.is_open_ended());
        assert_eq!(
            DateRange::open_ended(d(2025, 3, 1), Some(d(2025, 2, 1))),
            Err(PeriodError::EndBeforeStart)
        );
    }

    #[test]
    fn test_timed_range_validation() {
        assert_eq!(
            TimedRange::new(d(2025, 5, 1), d(2025, 5, 1), Some(t(9, 0)), None),
            Err(PeriodError::UnpairedTime)
        );
        assert_eq!(
            TimedRange::new(d(2025, 5, 1), d(2025, 5, 1), Some(t(9, 0)), Some(t(9, 0))),
            Err(PeriodError::EndTimeNotAfterStart)
        );
        // Multi-day windows may end earlier in the day than they start.
        assert!(TimedRange::new(d(2025, 5, 1), d(2025, 5, 2), Some(t(18, 0)), Some(t(8, 0))).is_ok());
    }

    #[test]
    fn test_timed_windows_touching_do_not_overlap() {
        let morning =
            TimedRange::new(d(2025, 5, 1), d(2025, 5, 1), Some(t(8, 0)), Some(t(10, 0))).expect("w");
        let later =
            TimedRange::new(d(2025, 5, 1), d(2025, 5, 1), Some(t(10, 0)), Some(t(12, 0))).expect("w");
        let inside =
            TimedRange::new(d(2025, 5, 1), d(2025, 5, 1), Some(t(9, 0)), Some(t(11, 0))).expect("w");
        assert!(!morning.overlaps(&later));
        assert!(morning.overlaps(&inside));
        assert!(later.overlaps(&inside));
    }

    #[test]
    fn test_date_only_windows_overlap_inclusively() {
        let a = TimedRange::new(d(2025, 5, 1), d(2025, 5, 3), None, None).expect("w");
        let b = TimedRange::new(d(2025, 5, 3), d(2025, 5, 4), None, None).expect("w");
        let c = TimedRange::new(d(2025, 5, 4), d(2025, 5, 4), None, None).expect("w");
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_mixed_windows_default_times() {
        let whole_day = TimedRange::new(d(2025, 5, 2), d(2025, 5, 2), None, None).expect("w");
        let evening_before =
            TimedRange::new(d(2025, 5, 1), d(2025, 5, 1), Some(t(20, 0)), Some(t(23, 0))).expect("w");
        let same_day =
            TimedRange::new(d(2025, 5, 2), d(2025, 5, 2), Some(t(20, 0)), Some(t(23, 0))).expect("w");
        assert!(!whole_day.overlaps(&evening_before));
        assert!(whole_day.overlaps(&same_day));
    }

    #[test]
    fn test_is_active_at() {
        let w = TimedRange::new(d(2025, 5, 1), d(2025, 5, 1), Some(t(8, 0)), Some(t(10, 0))).expect("w");
        assert!(w.is_active_at(d(2025, 5, 1).and_time(t(8, 0))));
        assert!(w.is_active_at(d(2025, 5, 1).and_time(t(10, 0))));
        assert!(!w.is_active_at(d(2025, 5, 1).and_time(t(10, 1))));
        let all_day = TimedRange::new(d(2025, 5, 1), d(2025, 5, 1), None, None).expect("w");
        assert!(all_day.is_active_at(d(2025, 5, 1).and_time(t(23, 30))));
    }

    #[test]
    fn test_month_period_bounds() {
        let feb = MonthPeriod::new(2024, 2).expect("month");
        assert_eq!(feb.first_day(), d(2024, 2, 1));
        assert_eq!(feb.last_day(), d(2024, 2, 29));
        assert_eq!(feb.clamp_day(31), d(2024, 2, 29));
        assert_eq!(feb.clamp_day(0), d(2024, 2, 1));
        assert_eq!(feb.compact(), "202402");
        assert!(feb.contains(d(2024, 2, 15)));
        assert!(!feb.contains(d(2024, 3, 1)));
        assert!(MonthPeriod::new(2024, 13).is_err());
    }

    #[test]
    fn test_add_months_clamps() {
        assert_eq!(add_months(d(2025, 1, 31), 1), d(2025, 2, 28));
        assert_eq!(add_months(d(2025, 1, 15), 12), d(2026, 1, 15));
    }

    #[test]
    fn test_package_end_date() {
        use super::super::status::PeriodUnit;

        let start = d(2025, 1, 31);
        assert_eq!(package_end_date(start, PeriodUnit::Month, 1, None), d(2025, 2, 28));
        assert_eq!(package_end_date(start, PeriodUnit::Day, 1, Some(7)), d(2025, 2, 7));
        // A day package without a usable duration falls back to months.
        assert_eq!(package_end_date(start, PeriodUnit::Day, 3, Some(0)), d(2025, 4, 30));
    }
}
