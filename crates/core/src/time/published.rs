use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

const SECONDS_PER_DAY: f64 = 86_400.0;

// Publishers and our own clock disagree by a few minutes now and then. Anything within this
// window ahead of `now` is treated as brand new instead of invalid.
const FUTURE_SKEW_TOLERANCE_SECS: i64 = 3600;

const NAIVE_DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Parses a publication timestamp as delivered by news providers.
///
/// Accepts RFC 3339 (including a trailing `Z`), offset-less date-times and bare dates. Values
/// without an offset are taken to be UTC. Returns `None` for anything else.
pub fn parse_published_at(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Fractional age in days of an article published at `published_at`, measured at `now`.
///
/// Returns `None` when the timestamp lies further in the future than the skew tolerance.
pub fn age_days(published_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<f64> {
    let age = now.signed_duration_since(published_at);
    if age < Duration::zero() {
        if -age > Duration::seconds(FUTURE_SKEW_TOLERANCE_SECS) {
            return None;
        }
        return Some(0.0);
    }
    Some(age.num_seconds() as f64 / SECONDS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_zulu_and_offset_timestamps() {
        let expected = Utc.with_ymd_and_hms(2026, 3, 2, 14, 30, 0).unwrap();
        assert_eq!(parse_published_at("2026-03-02T14:30:00Z"), Some(expected));
        assert_eq!(parse_published_at("2026-03-02T16:30:00+02:00"), Some(expected));
    }

    #[test]
    fn naive_values_are_utc() {
        let expected = Utc.with_ymd_and_hms(2026, 3, 2, 14, 30, 0).unwrap();
        assert_eq!(parse_published_at("2026-03-02T14:30:00"), Some(expected));
        assert_eq!(parse_published_at("2026-03-02 14:30:00"), Some(expected));
        assert_eq!(
            parse_published_at("2026-03-02"),
            Some(Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_published_at(""), None);
        assert_eq!(parse_published_at("yesterday"), None);
        assert_eq!(parse_published_at("2026-13-45"), None);
    }

    #[test]
    fn age_is_fractional_days() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let published = Utc.with_ymd_and_hms(2026, 3, 9, 0, 0, 0).unwrap();
        assert_eq!(age_days(published, now), Some(1.5));
    }

    #[test]
    fn small_future_skew_counts_as_fresh() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(age_days(now + Duration::minutes(10), now), Some(0.0));
        assert_eq!(age_days(now + Duration::days(2), now), None);
    }
}
