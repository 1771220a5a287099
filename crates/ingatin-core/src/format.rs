// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Date and time rendering in Indonesian conventions.

use chrono::{DateTime, Datelike, FixedOffset, Offset, TimeZone, Timelike, Utc};

const MONTHS_SHORT: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "Mei", "Jun", "Jul", "Agu", "Sep", "Okt", "Nov", "Des",
];

/// Fixed offset for a whole-hour zone such as WIB (`+7`).
///
/// Falls back to UTC when `hours` is out of range.
pub fn offset_hours(hours: i32) -> FixedOffset {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

/// `17 Okt 2026`
pub fn format_date<Tz: TimeZone>(dt: &DateTime<Tz>) -> String {
    format!(
        "{:02} {} {}",
        dt.day(),
        MONTHS_SHORT[dt.month0() as usize],
        dt.year()
    )
}

/// `14.05`
pub fn format_time<Tz: TimeZone>(dt: &DateTime<Tz>) -> String {
    format!("{:02}.{:02}", dt.hour(), dt.minute())
}

/// Date and time rendered separately, for two-line table cells.
pub fn format_date_time<Tz: TimeZone>(dt: &DateTime<Tz>) -> (String, String) {
    (format_date(dt), format_time(dt))
}

/// `17 Okt 2026, 14.05`
pub fn format_full_date_time<Tz: TimeZone>(dt: &DateTime<Tz>) -> String {
    format!("{}, {}", format_date(dt), format_time(dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_in_local_offset() {
        let utc = Utc.with_ymd_and_hms(2026, 10, 17, 7, 5, 0).unwrap();
        let wib = utc.with_timezone(&offset_hours(7));
        assert_eq!(format_date(&wib), "17 Okt 2026");
        assert_eq!(format_time(&wib), "14.05");
        assert_eq!(format_full_date_time(&wib), "17 Okt 2026, 14.05");
    }

    #[test]
    fn day_is_zero_padded_and_crosses_midnight() {
        let utc = Utc.with_ymd_and_hms(2026, 8, 3, 20, 30, 0).unwrap();
        let wib = utc.with_timezone(&offset_hours(7));
        let (date, time) = format_date_time(&wib);
        assert_eq!(date, "04 Agu 2026");
        assert_eq!(time, "03.30");
    }

    #[test]
    fn out_of_range_offset_falls_back_to_utc() {
        assert_eq!(offset_hours(99).local_minus_utc(), 0);
    }
}
