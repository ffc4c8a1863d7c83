//! Building time.
//!
//! Dates such as "today" (booking start, invoice generation day, overdue
//! checks) are taken in the building's local time, not the server's.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};

/// Clock pinned to the building's UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct BuildingClock {
    offset: FixedOffset,
}

impl BuildingClock {
    #[must_use]
    pub const fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Current instant.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Current wall-clock time in the building.
    #[must_use]
    pub fn now_local(&self) -> NaiveDateTime {
        self.local(self.now())
    }

    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.now_local().date()
    }

    /// Convert an instant to building wall-clock time.
    #[must_use]
    pub fn local(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.with_timezone(&self.offset).naive_local()
    }

    /// Interpret a building wall-clock time as an instant.
    #[must_use]
    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        (local - self.offset).and_utc()
    }
}

impl Default for BuildingClock {
    /// UTC+7 (Indochina Time).
    fn default() -> Self {
        Self::new(FixedOffset::east_opt(7 * 3600).unwrap_or_else(|| Utc.fix()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{NaiveDate, TimeZone};

    use super::*;

    #[test]
    fn test_local_date_crosses_midnight() {
        let clock = BuildingClock::default();
        // 18:30 UTC is already 01:30 the next day in Hanoi.
        let at = Utc.with_ymd_and_hms(2025, 3, 31, 18, 30, 0).unwrap();
        let local = clock.local(at);
        assert_eq!(local.date(), NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
        assert_eq!(clock.to_utc(local), at);
    }

    #[test]
    fn test_custom_offset() {
        let clock = BuildingClock::new(FixedOffset::west_opt(5 * 3600).unwrap());
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 3, 0, 0).unwrap();
        assert_eq!(
            clock.local(at).date(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
        );
    }
}
