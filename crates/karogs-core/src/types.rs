//! Flag-day data model.

use serde::{Deserialize, Serialize};

/// Telegram chat identifier.
pub type ChatId = i64;

/// Whether the flag is flown plainly or with a black mourning ribbon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagDayType {
    Normal,
    Mourning,
}

impl FlagDayType {
    /// Icon used in lists and reminders.
    pub fn icon(&self) -> &'static str {
        match self {
            FlagDayType::Normal => "🇱🇻",
            FlagDayType::Mourning => "🏴",
        }
    }

    /// Instruction line appended to a reminder.
    pub fn instruction(&self) -> &'static str {
        match self {
            FlagDayType::Normal => "Izkarat Latvijas valsts karogu!",
            FlagDayType::Mourning => "Izkarat Latvijas valsts karogu ar melnu sēru lenti!",
        }
    }
}

impl std::fmt::Display for FlagDayType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlagDayType::Normal => write!(f, "normal"),
            FlagDayType::Mourning => write!(f, "mourning"),
        }
    }
}

/// A flag day. Static entries carry no year until they are placed in a
/// yearly set; dynamic entries always carry the year they were computed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagDay {
    pub month: u32,
    pub day: u32,
    #[serde(rename = "type")]
    pub kind: FlagDayType,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

impl FlagDay {
    pub fn new(month: u32, day: u32, kind: FlagDayType, description: &str) -> Self {
        Self {
            month,
            day,
            kind,
            description: description.to_string(),
            year: None,
        }
    }

    /// Copy of this entry tagged with `year`.
    pub fn in_year(&self, year: i32) -> Self {
        Self {
            year: Some(year),
            ..self.clone()
        }
    }

    pub fn falls_on(&self, month: u32, day: u32) -> bool {
        self.month == month && self.day == day
    }
}
