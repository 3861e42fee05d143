//! Gregorian calendar arithmetic for the software clock
//!
//! All arithmetic works on broken-down fields with explicit rollover so that
//! the clock never depends on a platform time zone database.

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Seconds in one civil day
pub const SECONDS_PER_DAY: u32 = 86_400;

/// First year representable by the clock
pub const EPOCH_YEAR: u16 = 1970;

/// Days in each month of a common year
const DAYS_IN_MONTH: [u8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Returns true for Gregorian leap years
pub fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Returns the number of days in a month, or 30 for an invalid month
pub fn days_in_month(year: u16, month: u8) -> u8 {
    if !(1..=12).contains(&month) {
        return 30;
    }
    if month == 2 && is_leap_year(year) {
        29
    } else {
        DAYS_IN_MONTH[(month - 1) as usize]
    }
}

/// Day of week via Zeller's congruence, 0 = Sunday through 6 = Saturday
pub fn day_of_week(year: u16, month: u8, day: u8) -> u8 {
    let (mut y, mut m) = (year as i32, month as i32);
    if m < 3 {
        m += 12;
        y -= 1;
    }
    let q = day as i32;
    let k = y % 100;
    let j = y / 100;

    // 5j instead of -2j keeps the sum non-negative (same residue mod 7)
    let h = (q + (13 * (m + 1)) / 5 + k + k / 4 + j / 4 + 5 * j) % 7;

    // Zeller counts from Saturday
    ((h + 6) % 7) as u8
}

fn seconds_in_year(year: u16) -> u32 {
    if is_leap_year(year) {
        366 * SECONDS_PER_DAY
    } else {
        365 * SECONDS_PER_DAY
    }
}

/// A broken-down UTC (or local) calendar instant with one-second resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClockInstant {
    /// Full year (e.g. 2025)
    pub year: u16,
    /// Month, 1-12
    pub month: u8,
    /// Day of month, 1-31
    pub day: u8,
    /// Hour, 0-23
    pub hour: u8,
    /// Minute, 0-59
    pub minute: u8,
    /// Second, 0-59
    pub second: u8,
}

impl Default for ClockInstant {
    fn default() -> Self {
        ClockInstant::EPOCH
    }
}

impl ClockInstant {
    /// 1970-01-01T00:00:00
    pub const EPOCH: ClockInstant = ClockInstant::new(EPOCH_YEAR, 1, 1, 0, 0, 0);

    /// Creates an instant from its fields, without validation
    pub const fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        ClockInstant {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Decomposes seconds since 1970 into calendar fields
    ///
    /// Whole years are subtracted first, then whole months of the final
    /// year, leaving day/hour/minute/second remainders.
    pub fn from_epoch_seconds(epoch_seconds: u32) -> Self {
        let mut seconds = epoch_seconds;

        let mut year = EPOCH_YEAR;
        while seconds >= seconds_in_year(year) {
            seconds -= seconds_in_year(year);
            year += 1;
        }

        let mut month = 1u8;
        while month < 12 {
            let in_month = days_in_month(year, month) as u32 * SECONDS_PER_DAY;
            if seconds < in_month {
                break;
            }
            seconds -= in_month;
            month += 1;
        }

        let day = (seconds / SECONDS_PER_DAY) as u8 + 1;
        seconds %= SECONDS_PER_DAY;

        ClockInstant::new(
            year,
            month,
            day,
            (seconds / 3600) as u8,
            ((seconds % 3600) / 60) as u8,
            (seconds % 60) as u8,
        )
    }

    /// Seconds since 1970-01-01T00:00:00
    ///
    /// The count is 32 bits wide and wraps in February 2106.
    pub fn epoch_seconds(&self) -> u32 {
        let mut total: u64 = 0;

        for y in EPOCH_YEAR..self.year {
            total += seconds_in_year(y) as u64;
        }
        for m in 1..self.month {
            total += days_in_month(self.year, m) as u64 * SECONDS_PER_DAY as u64;
        }

        total += (self.day as u64).saturating_sub(1) * SECONDS_PER_DAY as u64;
        total += self.hour as u64 * 3600;
        total += self.minute as u64 * 60;
        total += self.second as u64;

        total as u32
    }

    /// Advances by one second, carrying through to the year
    pub fn increment_second(&mut self) {
        // Out-of-range fields carry like a full unit
        if self.second < 59 {
            self.second += 1;
            return;
        }
        self.second = 0;
        if self.minute < 59 {
            self.minute += 1;
            return;
        }
        self.minute = 0;
        if self.hour < 23 {
            self.hour += 1;
            return;
        }
        self.hour = 0;
        self.next_day();
    }

    /// Returns this instant shifted by a signed number of hours
    ///
    /// The shift is normalized one day at a time, so offsets that cross a
    /// month or year boundary land on a valid date in either direction.
    pub fn add_hours(&self, hours: i32) -> Self {
        let mut out = *self;
        let mut hour = self.hour as i32 + hours;

        while hour < 0 {
            hour += 24;
            out.previous_day();
        }
        while hour >= 24 {
            hour -= 24;
            out.next_day();
        }

        out.hour = hour as u8;
        out
    }

    /// Day of week, 0 = Sunday
    pub fn day_of_week(&self) -> u8 {
        day_of_week(self.year, self.month, self.day)
    }

    /// Converts to a chrono date-time, `None` if the fields are not a valid date
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)?.and_hms_opt(
            self.hour as u32,
            self.minute as u32,
            self.second as u32,
        )
    }

    /// Converts from a chrono date-time, `None` outside the representable years
    pub fn from_naive(dt: &NaiveDateTime) -> Option<Self> {
        let year = u16::try_from(dt.year()).ok().filter(|y| *y >= EPOCH_YEAR)?;
        Some(ClockInstant::new(
            year,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            // Leap seconds collapse into :59
            dt.second().min(59) as u8,
        ))
    }

    fn next_day(&mut self) {
        if self.day < days_in_month(self.year, self.month) {
            self.day += 1;
            return;
        }
        self.day = 1;
        if self.month < 12 {
            self.month += 1;
        } else {
            self.month = 1;
            self.year = self.year.saturating_add(1);
        }
    }

    fn previous_day(&mut self) {
        if self.day > 1 {
            self.day -= 1;
            return;
        }
        if self.month > 1 {
            self.month -= 1;
        } else {
            self.month = 12;
            self.year = self.year.saturating_sub(1);
        }
        self.day = days_in_month(self.year, self.month);
    }
}

impl fmt::Display for ClockInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    #[test]
    fn test_leap_years() {
        assert!(is_leap_year(2000));
        assert!(!is_leap_year(1900));
        assert!(is_leap_year(2024));
        assert!(!is_leap_year(2023));
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2023, 4), 30);
        assert_eq!(days_in_month(2023, 12), 31);
        assert_eq!(days_in_month(2023, 0), 30);
        assert_eq!(days_in_month(2023, 13), 30);
    }

    #[test]
    fn test_day_of_week() {
        assert_eq!(day_of_week(1970, 1, 1), 4); // Thursday
        assert_eq!(day_of_week(2000, 1, 1), 6); // Saturday
        assert_eq!(day_of_week(2024, 1, 1), 1); // Monday
        assert_eq!(day_of_week(2024, 2, 29), 4); // Thursday

        // Agree with chrono across several leap cycles
        let mut date = NaiveDate::from_ymd_opt(1999, 12, 25).unwrap();
        for _ in 0..3000 {
            let expected = match date.weekday() {
                Weekday::Sun => 0,
                other => other.number_from_monday() as u8,
            };
            assert_eq!(
                day_of_week(date.year() as u16, date.month() as u8, date.day() as u8),
                expected,
                "mismatch on {}",
                date
            );
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_epoch_seconds_matches_chrono() {
        let instant = ClockInstant::new(2025, 6, 15, 12, 34, 56);
        let expected = instant.to_naive().unwrap().and_utc().timestamp();
        assert_eq!(instant.epoch_seconds() as i64, expected);

        assert_eq!(ClockInstant::EPOCH.epoch_seconds(), 0);
        assert_eq!(ClockInstant::new(2020, 1, 1, 0, 0, 0).epoch_seconds(), 1_577_836_800);
    }

    #[test]
    fn test_epoch_round_trip() {
        for year in EPOCH_YEAR..2106 {
            for month in 1..=12u8 {
                for day in [1, 15, days_in_month(year, month)] {
                    let instant = ClockInstant::new(year, month, day, 0, 0, 0);
                    let rebuilt = ClockInstant::from_epoch_seconds(instant.epoch_seconds());
                    assert_eq!(rebuilt, instant);
                }
            }
        }
    }

    #[test]
    fn test_from_epoch_seconds_with_time_of_day() {
        let instant = ClockInstant::from_epoch_seconds(1_735_689_599);
        assert_eq!(instant, ClockInstant::new(2024, 12, 31, 23, 59, 59));
        assert_eq!(instant.to_string(), "2024-12-31T23:59:59Z");
    }

    #[test]
    fn test_increment_second_rollover() {
        let mut instant = ClockInstant::new(2023, 12, 31, 23, 59, 59);
        instant.increment_second();
        assert_eq!(instant, ClockInstant::new(2024, 1, 1, 0, 0, 0));

        let mut instant = ClockInstant::new(2024, 2, 28, 23, 59, 59);
        instant.increment_second();
        assert_eq!(instant, ClockInstant::new(2024, 2, 29, 0, 0, 0));
    }

    #[test]
    fn test_increment_second_out_of_range_fields() {
        let mut instant = ClockInstant::new(2025, 1, 1, 0, 255, 59);
        instant.increment_second();
        assert_eq!(instant, ClockInstant::new(2025, 1, 1, 1, 0, 0));

        let mut instant = ClockInstant::new(2025, 1, 1, 255, 255, 255);
        instant.increment_second();
        assert_eq!(instant, ClockInstant::new(2025, 1, 2, 0, 0, 0));

        let mut instant = ClockInstant::new(u16::MAX, 12, 31, 23, 59, 59);
        instant.increment_second();
        assert_eq!(instant, ClockInstant::new(u16::MAX, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_add_hours_backward_across_year() {
        let utc = ClockInstant::new(2025, 1, 1, 2, 0, 0);
        assert_eq!(utc.add_hours(-5), ClockInstant::new(2024, 12, 31, 21, 0, 0));
    }

    #[test]
    fn test_add_hours_forward_across_month() {
        let utc = ClockInstant::new(2024, 2, 28, 20, 30, 0);
        assert_eq!(utc.add_hours(14), ClockInstant::new(2024, 2, 29, 10, 30, 0));
        assert_eq!(utc.add_hours(38), ClockInstant::new(2024, 3, 1, 10, 30, 0));
        assert_eq!(utc.add_hours(0), utc);
    }

    #[test]
    fn test_naive_conversion() {
        let instant = ClockInstant::new(2024, 2, 29, 1, 2, 3);
        let naive = instant.to_naive().unwrap();
        assert_eq!(ClockInstant::from_naive(&naive), Some(instant));

        assert!(ClockInstant::new(2023, 2, 29, 0, 0, 0).to_naive().is_none());
        let early = NaiveDate::from_ymd_opt(1969, 12, 31).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert!(ClockInstant::from_naive(&early).is_none());
    }
}
