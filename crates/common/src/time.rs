use chrono::{NaiveDate, NaiveDateTime, Timelike, Utc};
use chrono_tz::Asia::Taipei;

/// Timestamp layout used in history rows and exports, e.g. `2025-06-01 14:03:22`.
pub const DRAW_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Stamp embedded in export file names.
pub const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Wall clock in the classroom's timezone, truncated to whole seconds.
pub fn taipei_now() -> NaiveDateTime {
    let now = Utc::now().with_timezone(&Taipei).naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// The calendar day draw opportunities are counted against.
pub fn taipei_today() -> NaiveDate {
    taipei_now().date()
}

pub fn format_draw_time(time: &NaiveDateTime) -> String {
    time.format(DRAW_TIME_FORMAT).to_string()
}

pub fn format_file_stamp(time: &NaiveDateTime) -> String {
    time.format(FILE_STAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_match_export_layout() {
        let time = NaiveDate::from_ymd_opt(2025, 3, 7)
            .and_then(|d| d.and_hms_opt(9, 5, 1))
            .unwrap();
        assert_eq!(format_draw_time(&time), "2025-03-07 09:05:01");
        assert_eq!(format_file_stamp(&time), "20250307_090501");
    }

    #[test]
    fn now_has_whole_seconds() {
        assert_eq!(taipei_now().nanosecond(), 0);
    }
}
