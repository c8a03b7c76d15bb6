//! Flag days that move from year to year.
//!
//! Good Friday and Easter follow the Gregorian computus; the commemoration of
//! the victims of the communist regime falls on the first Sunday of December.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Datelike, Days, NaiveDate};
use karogs_core::{FlagDay, FlagDayType};

const GOOD_FRIDAY: &str = "Lielā Piektdiena";
const EASTER: &str = "Lieldienas";
const COMMUNIST_REGIME_VICTIMS: &str = "Komunistiskā režīma upuru piemiņas diena";

/// Easter Sunday for a Gregorian year (Butcher–Meeus).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year.rem_euclid(19);
    let b = year.div_euclid(100);
    let c = year.rem_euclid(100);
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15).rem_euclid(30);
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k).rem_euclid(7);
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;

    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// First Sunday of December, or `None` if the arithmetic ever left December.
pub fn first_sunday_of_december(year: i32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, 12, 1)?;
    let weekday = first.weekday().number_from_monday();
    let offset = if weekday == 7 { 0 } else { (7 - weekday) % 7 };
    let sunday = first.checked_add_days(Days::new(u64::from(offset)))?;
    (sunday.month() == 12).then_some(sunday)
}

/// Computes and caches the moving flag days of each year.
#[derive(Debug, Default)]
pub struct DynamicDateCalculator {
    cache: Mutex<HashMap<i32, Arc<Vec<FlagDay>>>>,
    computations: AtomicUsize,
}

impl DynamicDateCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Good Friday, Easter, first Sunday of December, in that order.
    pub fn dates_for_year(&self, year: i32) -> Arc<Vec<FlagDay>> {
        if let Some(hit) = self.lock_cache().get(&year) {
            return Arc::clone(hit);
        }

        let dates = Arc::new(self.compute(year));
        self.lock_cache()
            .entry(year)
            .or_insert_with(|| Arc::clone(&dates))
            .clone()
    }

    /// The moving flag day on `month`/`day` of `year`, if any.
    pub fn date_on(&self, year: i32, month: u32, day: u32) -> Option<FlagDay> {
        self.dates_for_year(year)
            .iter()
            .find(|d| d.falls_on(month, day))
            .cloned()
    }

    /// How many years have actually been computed (cache misses).
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }

    fn compute(&self, year: i32) -> Vec<FlagDay> {
        self.computations.fetch_add(1, Ordering::Relaxed);
        let mut dates = Vec::with_capacity(3);

        match easter_sunday(year) {
            Some(easter) => {
                if let Some(friday) = easter.checked_sub_days(Days::new(2)) {
                    dates.push(entry(friday, FlagDayType::Normal, GOOD_FRIDAY, year));
                }
                dates.push(entry(easter, FlagDayType::Normal, EASTER, year));
            }
            None => tracing::warn!("⚠️ Could not compute Easter for {year}"),
        }

        if let Some(sunday) = first_sunday_of_december(year) {
            dates.push(entry(sunday, FlagDayType::Mourning, COMMUNIST_REGIME_VICTIMS, year));
        }

        tracing::debug!("📆 Computed {} moving flag days for {year}", dates.len());
        dates
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<i32, Arc<Vec<FlagDay>>>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn entry(date: NaiveDate, kind: FlagDayType, description: &str, year: i32) -> FlagDay {
    FlagDay::new(date.month(), date.day(), kind, description).in_year(year)
}
