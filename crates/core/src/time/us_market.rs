use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};

// US Eastern standard offset. The daily scan runs well clear of midnight ET,
// so the DST hour cannot move the resolved calendar date.
const ET_OFFSET_SECS: i32 = -5 * 3600;

/// Resolve the scan's "today": an explicit `--date` override, otherwise the
/// current US-Eastern calendar date. No close-time cutoff; the scan looks
/// forward at upcoming earnings, not back at a finished session.
pub fn resolve_scan_date(
    date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = date_arg {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid scan date '{s}', expected YYYY-MM-DD"));
    }

    let et = chrono::FixedOffset::east_opt(ET_OFFSET_SECS).context("invalid ET offset")?;
    Ok(now_utc.with_timezone(&et).date_naive())
}

/// Calendar days from `from` to `to`; negative when `to` is in the past.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn explicit_date_wins() {
        let now = Utc.with_ymd_and_hms(2025, 11, 17, 12, 0, 0).unwrap();
        let d = resolve_scan_date(Some("2025-11-10"), now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 11, 10).unwrap());
    }

    #[test]
    fn malformed_date_is_an_error() {
        let now = Utc.with_ymd_and_hms(2025, 11, 17, 12, 0, 0).unwrap();
        assert!(resolve_scan_date(Some("11/17/2025"), now).is_err());
    }

    #[test]
    fn utc_evening_is_still_the_same_eastern_day() {
        // 2025-11-18 03:00 UTC = 2025-11-17 22:00 ET.
        let now = Utc.with_ymd_and_hms(2025, 11, 18, 3, 0, 0).unwrap();
        let d = resolve_scan_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 11, 17).unwrap());
    }

    #[test]
    fn days_between_spans_and_signs() {
        let a = NaiveDate::from_ymd_opt(2025, 11, 17).unwrap();
        let b = NaiveDate::from_ymd_opt(2025, 12, 19).unwrap();
        assert_eq!(days_between(a, b), 32);
        assert_eq!(days_between(b, a), -32);
        assert_eq!(days_between(a, a), 0);
    }
}
