//! Message text: Latvian wording, Telegram Markdown (v1).

use chrono::{Datelike, NaiveDate};
use karogs_calendar::UpcomingFlagDay;
use karogs_core::FlagDay;

const WIKIPEDIA_BASE: &str = "https://lv.wikipedia.org/wiki/";

/// Descriptions whose article title differs from the description itself.
const WIKIPEDIA_SPECIAL: [(&str, &str); 3] = [
    ("Ebreju tautas genocīda upuru piemiņas diena", "Holokausts_Latvijā"),
    (
        "Komunistiskā režīma upuru piemiņas diena",
        "Pret_latviešu_tautu_vērstā_totalitārā_komunistiskā_režīma_genocīda_upuru_piemiņas_diena",
    ),
    (
        "Konstitucionālā likuma \"Par Latvijas Republikas valstisko statusu\" pieņemšanas diena",
        "Par_Latvijas_Republikas_valstisko_statusu",
    ),
];

/// `DD.MM`
pub fn latvian_date(day: u32, month: u32) -> String {
    format!("{day:02}.{month:02}")
}

pub fn wikipedia_url(description: &str) -> String {
    let article = WIKIPEDIA_SPECIAL
        .iter()
        .find(|(d, _)| *d == description)
        .map(|(_, article)| article.to_string())
        .unwrap_or_else(|| description.split_whitespace().collect::<Vec<_>>().join("_"));
    format!("{WIKIPEDIA_BASE}{article}")
}

pub fn markdown_link(description: &str) -> String {
    format!("[{}]({})", description, wikipedia_url(description))
}

/// The daily reminder sent to every subscriber.
pub fn reminder(flag_day: &FlagDay, today: NaiveDate, next: Option<&UpcomingFlagDay>) -> String {
    let base = format!(
        "Šodien, *{}* - {}.",
        latvian_date(today.day(), today.month()),
        markdown_link(&flag_day.description)
    );
    let mut text = format!(
        "{} {}\n🫡 {}",
        flag_day.kind.icon(),
        base,
        flag_day.kind.instruction()
    );

    if let Some(next) = next {
        text.push_str(&format!(
            "\n\n⏭️ Nākamā karoga diena: *{}* - {}",
            latvian_date(next.flag_day.day, next.flag_day.month),
            markdown_link(&next.flag_day.description)
        ));
    }
    text
}

/// All flag days of a year, one per line.
pub fn flag_days_list(days: &[FlagDay], year: i32) -> String {
    if days.is_empty() {
        return "Nav atrasta neviena karoga diena.".into();
    }

    let mut sorted: Vec<&FlagDay> = days.iter().collect();
    sorted.sort_by_key(|d| (d.month, d.day));

    let mut text = format!("*Latvijas valsts karoga izkāršanas dienas {year}. gadā:*\n\n");
    for day in sorted {
        text.push_str(&format!(
            "{} *{}* - {}\n",
            day.kind.icon(),
            latvian_date(day.day, day.month),
            markdown_link(&day.description)
        ));
    }
    text
}

pub fn next_flag_day(next: &UpcomingFlagDay) -> String {
    format!(
        "{} Nākamā karoga diena:\n\n*{}, {}* - {}",
        next.flag_day.kind.icon(),
        latvian_date(next.flag_day.day, next.flag_day.month),
        next.year,
        markdown_link(&next.flag_day.description)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Riga;
    use karogs_core::FlagDayType;

    fn proclamation() -> FlagDay {
        FlagDay::new(11, 18, FlagDayType::Normal, "Latvijas Republikas proklamēšanas diena")
    }

    fn upcoming_dec_1() -> UpcomingFlagDay {
        UpcomingFlagDay {
            flag_day: FlagDay::new(12, 1, FlagDayType::Mourning, "Komunistiskā režīma upuru piemiņas diena"),
            year: 2024,
            starts_at: Riga.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_latvian_date_padding() {
        assert_eq!(latvian_date(4, 5), "04.05");
        assert_eq!(latvian_date(18, 11), "18.11");
    }

    #[test]
    fn test_wikipedia_links() {
        assert_eq!(wikipedia_url("Līgo diena"), "https://lv.wikipedia.org/wiki/Līgo_diena");
        assert_eq!(
            wikipedia_url("Ebreju tautas genocīda upuru piemiņas diena"),
            "https://lv.wikipedia.org/wiki/Holokausts_Latvijā"
        );
        assert_eq!(
            markdown_link("Jāņu diena"),
            "[Jāņu diena](https://lv.wikipedia.org/wiki/Jāņu_diena)"
        );
    }

    #[test]
    fn test_reminder_normal_with_next() {
        let today = NaiveDate::from_ymd_opt(2024, 11, 18).unwrap();
        let text = reminder(&proclamation(), today, Some(&upcoming_dec_1()));
        assert!(text.starts_with("🇱🇻 Šodien, *18.11* - [Latvijas Republikas proklamēšanas diena]("));
        assert!(text.contains("\n🫡 Izkarat Latvijas valsts karogu!"));
        assert!(text.contains("\n\n⏭️ Nākamā karoga diena: *01.12* - [Komunistiskā režīma upuru piemiņas diena]"));
        assert!(text.contains("Pret_latviešu_tautu"));
    }

    #[test]
    fn test_reminder_mourning_without_next() {
        let day = FlagDay::new(6, 17, FlagDayType::Mourning, "Latvijas Republikas okupācijas diena");
        let today = NaiveDate::from_ymd_opt(2025, 6, 17).unwrap();
        let text = reminder(&day, today, None);
        assert!(text.starts_with("🏴 Šodien, *17.06*"));
        assert!(text.ends_with("ar melnu sēru lenti!"));
        assert!(!text.contains("⏭️"));
    }

    #[test]
    fn test_flag_days_list() {
        let days = vec![
            proclamation(),
            FlagDay::new(5, 4, FlagDayType::Normal, "Latvijas Republikas Neatkarības deklarācijas pasludināšanas diena"),
        ];
        let text = flag_days_list(&days, 2025);
        assert!(text.starts_with("*Latvijas valsts karoga izkāršanas dienas 2025. gadā:*\n\n"));
        let may = text.find("*04.05*").unwrap();
        let nov = text.find("*18.11*").unwrap();
        assert!(may < nov);
        assert_eq!(flag_days_list(&[], 2025), "Nav atrasta neviena karoga diena.");
    }

    #[test]
    fn test_next_flag_day_text() {
        let text = next_flag_day(&upcoming_dec_1());
        assert!(text.starts_with("🏴 Nākamā karoga diena:\n\n*01.12, 2024* - ["));
    }
}
