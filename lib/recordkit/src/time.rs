//! Timestamp helpers shared by casting and soft deletes.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, Utc};

/// Current UTC time at the microsecond precision `DATETIME(6)` keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Parse the textual date forms MySQL and JSON payloads produce.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.fraction]` and `YYYY-MM-DD`.
/// Zone-less forms are read as UTC.
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Interpret an integer as milliseconds since the Unix epoch.
pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn now_has_no_sub_microsecond_component() {
        assert_eq!(now().nanosecond() % 1_000, 0);
    }

    #[test]
    fn parses_mysql_and_rfc3339_forms() {
        let a = parse_datetime("2024-06-15 10:30:00").unwrap();
        let b = parse_datetime("2024-06-15T10:30:00Z").unwrap();
        let c = parse_datetime("2024-06-15T12:30:00+02:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);

        let d = parse_datetime("2024-06-15").unwrap();
        assert_eq!((d.year(), d.month(), d.day(), d.hour()), (2024, 6, 15, 0));

        assert!(parse_datetime("not a date").is_none());
    }
}
