use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};

/// This is the standard way of converting a date to a string in timetracker.
pub fn date_label(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Instant at which `date` begins in `tz`. When midnight falls into a DST gap the naive time is
/// read as UTC, which is at most one offset away from the real boundary.
pub fn day_start<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|v| v.to_utc())
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Half-open `[start, end)` UTC bounds of a calendar day in `tz`.
pub fn day_bounds<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day_start(date, tz);
    let end = date
        .succ_opt()
        .map(|next| day_start(next, tz))
        .unwrap_or(start + Duration::days(1));
    (start, end)
}

/// Storage representation of an instant. Fixed width, so lexical order matches time order.
pub fn to_storage(moment: &DateTime<Utc>) -> String {
    moment.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn from_storage(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Stored timestamp {value:?} is not RFC 3339"))?
        .to_utc())
}

/// Formats seconds as `1h2m3s`, dropping leading zero units.
pub fn format_seconds(seconds: f64) -> String {
    let total = seconds.max(0.).round() as i64;
    let (hours, minutes, seconds) = (total / 3600, total % 3600 / 60, total % 60);
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Short `Xh Ym` form used for daily totals.
pub fn format_work_time(seconds: f64) -> String {
    let total = seconds.max(0.) as i64;
    format!("{}h {}m", total / 3600, total % 3600 / 60)
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};

    use super::{day_bounds, format_seconds, format_work_time, from_storage, to_storage};

    #[test]
    fn day_bounds_follow_offset() {
        let tz = FixedOffset::east_opt(9 * 3600).unwrap();
        let (start, end) = day_bounds(NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(), &tz);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 1, 9, 15, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 10, 15, 0, 0).unwrap());
    }

    #[test]
    fn storage_format_is_sortable() {
        let early = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(1500);
        assert!(to_storage(&early) < to_storage(&late));
        assert_eq!(to_storage(&early).len(), to_storage(&late).len());
        assert_eq!(from_storage(&to_storage(&late)).unwrap(), late);
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_seconds(3725.), "1h2m5s");
        assert_eq!(format_seconds(65.), "1m5s");
        assert_eq!(format_seconds(4.6), "5s");
        assert_eq!(format_work_time(3725.), "1h 2m");
    }
}
