//! Weekly Meal Menu
//!
//! A week of dish lists indexed Monday = 0 .. Sunday = 6, plus the text
//! rendering used in chat replies.

mod store;

pub use store::{FileMenuStore, MENU_MISSING, MenuStore};

use crate::error::{BotError, Result};
use chrono::{Datelike, Weekday};
use serde::{Deserialize, Serialize};

/// Number of addressable day slots.
pub const DAYS_IN_WEEK: usize = 7;

/// Slots a freshly written record is padded to (Monday..Saturday).
pub const MIN_SLOTS: usize = 6;

/// Shown in place of a dish list when a day has no data.
pub const PLACEHOLDER_DISH: &str = "Menu belum tersedia";

/// Day names as they appear in replies, Monday first.
pub const DAY_NAMES: [&str; DAYS_IN_WEEK] = [
    "Senin", "Selasa", "Rabu", "Kamis", "Jumat", "Sabtu", "Minggu",
];

/// Monday-based index of a weekday.
pub fn day_index(weekday: Weekday) -> usize {
    weekday.num_days_from_monday() as usize
}

/// Monday-based index of the current local day.
pub fn today_index() -> usize {
    day_index(chrono::Local::now().weekday())
}

/// Reject day indices outside 0..=6.
pub fn check_day(day: usize) -> Result<()> {
    if day < DAYS_IN_WEEK {
        Ok(())
    } else {
        Err(BotError::Validation(format!(
            "day index {} out of range 0..={}",
            day,
            DAYS_IN_WEEK - 1
        )))
    }
}

/// Dish lists per day. Stored on disk as a JSON array of string arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MenuRecord {
    days: Vec<Vec<String>>,
}

impl MenuRecord {
    /// Build a record, enforcing the at-most-seven-slots schema.
    pub fn from_days(days: Vec<Vec<String>>) -> Result<Self> {
        if days.len() > DAYS_IN_WEEK {
            return Err(BotError::Persistence(format!(
                "menu has {} day slots, at most {} allowed",
                days.len(),
                DAYS_IN_WEEK
            )));
        }
        Ok(Self { days })
    }

    /// Parse and validate the on-disk representation.
    pub fn from_json(raw: &str) -> Result<Self> {
        let days: Vec<Vec<String>> = serde_json::from_str(raw)?;
        Self::from_days(days)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.days)?)
    }

    /// Dishes for a day, or `None` when the slot was never written.
    pub fn day(&self, day: usize) -> Option<&[String]> {
        self.days.get(day).map(Vec::as_slice)
    }

    pub fn slot_count(&self) -> usize {
        self.days.len()
    }

    /// Replace one day's dishes, growing the record to at least
    /// [`MIN_SLOTS`] slots so Monday..Saturday always exist.
    pub fn set_day(&mut self, day: usize, dishes: Vec<String>) -> Result<()> {
        check_day(day)?;
        let needed = MIN_SLOTS.max(day + 1);
        if self.days.len() < needed {
            self.days.resize_with(needed, Vec::new);
        }
        self.days[day] = dishes;
        Ok(())
    }
}

/// Render a numbered dish list under a heading:
///
/// ```text
/// 🍽 *Menu Hari Rabu:*
/// 1. soto
/// 2. sate
/// ```
pub fn render_menu(heading: &str, dishes: Option<&[String]>) -> String {
    let placeholder = [PLACEHOLDER_DISH.to_string()];
    let dishes = match dishes {
        Some(d) if !d.is_empty() => d,
        _ => &placeholder[..],
    };
    let lines: Vec<String> = dishes
        .iter()
        .enumerate()
        .map(|(i, dish)| format!("{}. {}", i + 1, dish))
        .collect();
    format!("\u{1f37d} *Menu Hari {}:*\n{}", heading, lines.join("\n"))
}

/// Render the menu for a named day.
pub fn render_day(record: &MenuRecord, day: usize) -> String {
    let name = DAY_NAMES.get(day).copied().unwrap_or("?");
    render_menu(name, record.day(day))
}
