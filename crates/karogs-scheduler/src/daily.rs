//! Daily trigger arithmetic: "the next HH:00 in timezone TZ".

use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use karogs_calendar::local_instant;

/// The first local `hour:00` in `tz` strictly after `after`.
///
/// If `hour:00` does not exist that day (spring-forward gap) the trigger
/// moves to the first instant after the gap; if it exists twice (fall-back)
/// the earlier one is used. Returns `None` for an hour outside 0–23.
pub fn next_daily_run(hour: u8, tz: Tz, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let local_date = after.with_timezone(&tz).date_naive();

    for offset in 0..=2 {
        let date = local_date.checked_add_days(Days::new(offset))?;
        let Some(candidate) = hour_on(tz, date, hour) else {
            continue;
        };
        if candidate > after {
            return Some(candidate);
        }
    }

    None
}

fn hour_on(tz: Tz, date: NaiveDate, hour: u8) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(u32::from(hour), 0, 0)?;
    local_instant(tz, naive).map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Riga;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_later_today() {
        // 06:00 in Riga (UTC+2 in November).
        let next = next_daily_run(7, Riga, utc(2024, 11, 18, 4, 0)).unwrap();
        assert_eq!(next, utc(2024, 11, 18, 5, 0));
    }

    #[test]
    fn test_exact_trigger_time_moves_to_tomorrow() {
        let next = next_daily_run(7, Riga, utc(2024, 11, 18, 5, 0)).unwrap();
        assert_eq!(next, utc(2024, 11, 19, 5, 0));
    }

    #[test]
    fn test_already_passed_today() {
        let next = next_daily_run(7, Riga, utc(2024, 11, 18, 12, 0)).unwrap();
        assert_eq!(next, utc(2024, 11, 19, 5, 0));
    }

    #[test]
    fn test_summer_offset() {
        // UTC+3 in summer.
        let next = next_daily_run(7, Riga, utc(2024, 6, 22, 12, 0)).unwrap();
        assert_eq!(next, utc(2024, 6, 23, 4, 0));
    }

    #[test]
    fn test_local_date_differs_from_utc_date() {
        // 22:30 UTC on the 17th is 00:30 on the 18th in Riga.
        let next = next_daily_run(7, Riga, utc(2024, 11, 17, 22, 30)).unwrap();
        assert_eq!(next, utc(2024, 11, 18, 5, 0));
    }

    #[test]
    fn test_spring_forward_gap() {
        // 2025-03-30: 03:00 local does not exist in Riga.
        let next = next_daily_run(3, Riga, utc(2025, 3, 29, 12, 0)).unwrap();
        assert_eq!(next, utc(2025, 3, 30, 1, 0));
    }

    #[test]
    fn test_fall_back_ambiguity_takes_earlier() {
        // 2025-10-26: 03:00 local happens twice in Riga.
        let next = next_daily_run(3, Riga, utc(2025, 10, 25, 12, 0)).unwrap();
        assert_eq!(next, utc(2025, 10, 26, 0, 0));
    }

    #[test]
    fn test_invalid_hour() {
        assert!(next_daily_run(24, Riga, Utc::now()).is_none());
    }
}
