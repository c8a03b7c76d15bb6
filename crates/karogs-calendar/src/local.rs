//! Naive local time → instant, for wall-clock times DST may skip or repeat.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

/// Resolve a local wall-clock time in `tz`.
///
/// A time inside a spring-forward gap resolves to the first instant after
/// the gap. A repeated (fall-back) time resolves to the earlier instant.
pub fn local_instant(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => Some(t),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => {
            // Gaps are at most one hour in every zone we care about.
            let before_gap = tz.from_local_datetime(&(naive - Duration::hours(1))).earliest()?;
            Some(before_gap + Duration::hours(1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chrono_tz::Asia::Beirut;
    use chrono_tz::Europe::Riga;

    fn naive(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn test_regular_time() {
        let t = local_instant(Riga, naive(2024, 11, 18, 7)).unwrap();
        assert_eq!(t, Riga.with_ymd_and_hms(2024, 11, 18, 7, 0, 0).unwrap());
    }

    #[test]
    fn test_midnight_gap_resolves_to_end_of_gap() {
        // Beirut springs forward 00:00 → 01:00 on 2024-03-31.
        let t = local_instant(Beirut, naive(2024, 3, 31, 0)).unwrap();
        assert_eq!(t, Beirut.with_ymd_and_hms(2024, 3, 31, 1, 0, 0).unwrap());
    }

    #[test]
    fn test_repeated_time_takes_earlier() {
        let t = local_instant(Riga, naive(2025, 10, 26, 3)).unwrap();
        assert_eq!(t.with_timezone(&chrono::Utc), chrono::Utc.with_ymd_and_hms(2025, 10, 26, 0, 0, 0).unwrap());
    }
}
