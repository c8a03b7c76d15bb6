//! Flag day registry: the fixed Latvian flag-day table merged with the
//! moving dates, plus the "today" and "next" queries the bot asks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Datelike, NaiveDate};
use chrono_tz::Tz;
use karogs_core::{FlagDay, FlagDayType};

use crate::clock::Clock;
use crate::dynamic::DynamicDateCalculator;
use crate::local::local_instant;

/// A compiled-in flag day that falls on the same date every year.
#[derive(Debug, Clone, Copy)]
pub struct StaticFlagDay {
    pub month: u32,
    pub day: u32,
    pub kind: FlagDayType,
    pub description: &'static str,
}

impl StaticFlagDay {
    const fn new(month: u32, day: u32, kind: FlagDayType, description: &'static str) -> Self {
        Self {
            month,
            day,
            kind,
            description,
        }
    }

    pub fn to_flag_day(&self) -> FlagDay {
        FlagDay::new(self.month, self.day, self.kind, self.description)
    }
}

/// Fixed flag days. Descriptions feed message text and Wikipedia links and
/// must not be reworded.
pub const STATIC_FLAG_DAYS: [StaticFlagDay; 10] = [
    StaticFlagDay::new(5, 1, FlagDayType::Normal, "Latvijas Republikas Satversmes sapulces sasaukšanas diena"),
    StaticFlagDay::new(5, 4, FlagDayType::Normal, "Latvijas Republikas Neatkarības deklarācijas pasludināšanas diena"),
    StaticFlagDay::new(6, 14, FlagDayType::Mourning, "Komunistiskā genocīda upuru piemiņas diena"),
    StaticFlagDay::new(6, 17, FlagDayType::Mourning, "Latvijas Republikas okupācijas diena"),
    StaticFlagDay::new(6, 23, FlagDayType::Normal, "Līgo diena"),
    StaticFlagDay::new(6, 24, FlagDayType::Normal, "Jāņu diena"),
    StaticFlagDay::new(7, 4, FlagDayType::Mourning, "Ebreju tautas genocīda upuru piemiņas diena"),
    StaticFlagDay::new(11, 11, FlagDayType::Normal, "Lāčplēša diena"),
    StaticFlagDay::new(11, 18, FlagDayType::Normal, "Latvijas Republikas proklamēšanas diena"),
    StaticFlagDay::new(3, 25, FlagDayType::Mourning, "Komunistiskā genocīda upuru piemiņas diena"),
];

/// The next flag day after "now".
#[derive(Debug, Clone, PartialEq)]
pub struct UpcomingFlagDay {
    pub flag_day: FlagDay,
    pub year: i32,
    /// Local midnight of the flag day, or the end of a DST gap covering it.
    pub starts_at: DateTime<Tz>,
}

/// Memoized answer to "is today a flag day", keyed by local ISO date.
#[derive(Debug, Clone)]
struct TodayCacheEntry {
    date_key: String,
    result: Option<FlagDay>,
}

/// Answers flag-day questions for a timezone.
pub struct FlagDayRegistry {
    calculator: Arc<DynamicDateCalculator>,
    clock: Arc<dyn Clock>,
    tz: Tz,
    yearly: Mutex<HashMap<i32, Arc<Vec<FlagDay>>>>,
    today: Mutex<Option<TodayCacheEntry>>,
}

impl FlagDayRegistry {
    pub fn new(calculator: Arc<DynamicDateCalculator>, clock: Arc<dyn Clock>, tz: Tz) -> Self {
        Self {
            calculator,
            clock,
            tz,
            yearly: Mutex::new(HashMap::new()),
            today: Mutex::new(None),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Current instant in the registry's timezone.
    pub fn now_local(&self) -> DateTime<Tz> {
        self.clock.now().with_timezone(&self.tz)
    }

    pub fn today(&self) -> NaiveDate {
        self.now_local().date_naive()
    }

    /// Every flag day of `year`, ordered by (month, day). Static entries come
    /// before a moving entry that lands on the same date.
    pub fn all_flag_days_for_year(&self, year: i32) -> Arc<Vec<FlagDay>> {
        if let Some(hit) = self.lock_yearly().get(&year) {
            return Arc::clone(hit);
        }

        let mut days: Vec<FlagDay> = STATIC_FLAG_DAYS
            .iter()
            .map(|s| s.to_flag_day().in_year(year))
            .collect();
        days.extend(self.calculator.dates_for_year(year).iter().cloned());
        // Stable: keeps static-before-dynamic on equal dates.
        days.sort_by_key(|d| (d.month, d.day));

        let days = Arc::new(days);
        self.lock_yearly()
            .entry(year)
            .or_insert_with(|| Arc::clone(&days))
            .clone()
    }

    /// Today's flag day in the configured timezone, if there is one.
    pub fn flag_day_today(&self) -> Option<FlagDay> {
        let today = self.today();
        let date_key = today.format("%Y-%m-%d").to_string();

        {
            let cache = self.lock_today();
            if let Some(entry) = cache.as_ref().filter(|e| e.date_key == date_key) {
                return entry.result.clone();
            }
        }

        let result = STATIC_FLAG_DAYS
            .iter()
            .find(|s| s.month == today.month() && s.day == today.day())
            .map(|s| s.to_flag_day().in_year(today.year()))
            .or_else(|| self.calculator.date_on(today.year(), today.month(), today.day()));

        tracing::debug!(
            "🔎 Flag day check for {date_key}: {}",
            result.as_ref().map(|d| d.description.as_str()).unwrap_or("none")
        );

        *self.lock_today() = Some(TodayCacheEntry {
            date_key,
            result: result.clone(),
        });
        result
    }

    /// The earliest flag day strictly after now. A flag day counts as passed
    /// from its local midnight onwards.
    pub fn next_flag_day(&self) -> Option<UpcomingFlagDay> {
        let now = self.now_local();
        let year = now.year();

        let mut upcoming: Vec<UpcomingFlagDay> = Vec::new();
        for (y, only_future) in [(year, true), (year + 1, false)] {
            for day in self.all_flag_days_for_year(y).iter() {
                let Some(starts_at) = self.local_midnight(y, day.month, day.day) else {
                    continue;
                };
                if only_future && starts_at <= now {
                    continue;
                }
                upcoming.push(UpcomingFlagDay {
                    flag_day: day.clone(),
                    year: y,
                    starts_at,
                });
            }
        }

        upcoming.sort_by_key(|u| u.starts_at);
        upcoming.into_iter().next()
    }

    fn local_midnight(&self, year: i32, month: u32, day: u32) -> Option<DateTime<Tz>> {
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        local_instant(self.tz, date.and_hms_opt(0, 0, 0)?)
    }

    fn lock_yearly(&self) -> std::sync::MutexGuard<'_, HashMap<i32, Arc<Vec<FlagDay>>>> {
        self.yearly.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_today(&self) -> std::sync::MutexGuard<'_, Option<TodayCacheEntry>> {
        self.today.lock().unwrap_or_else(|e| e.into_inner())
    }
}
