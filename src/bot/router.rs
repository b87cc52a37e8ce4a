//! Command Router
//!
//! Classifies inbound text into a [`Command`]. Routes are evaluated in a
//! fixed order and the first match wins. Markers compare case-insensitively
//! and must be followed by whitespace or end of text, so `!mealtime` is not
//! a meal query. Arguments keep their original case.

use super::replies;
use crate::error::{BotError, Result};
use crate::menu::DAYS_IN_WEEK;
use once_cell::sync::Lazy;
use regex::Regex;

/// Highest day index `!setmeal` accepts (Saturday).
pub const SETMEAL_MAX_DAY: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    /// `!meal [day]`; `None` means today.
    ShowMeal { day: Option<usize> },
    /// `!setmeal <day> "<dish, dish>"`
    SetMeal { day: usize, dishes: Vec<String> },
    /// `!ask <text>` or `/gpt <text>`
    Ask { prompt: String },
    /// No route matched.
    Chatter,
}

enum Matcher {
    Exact(&'static str),
    Marker(&'static [&'static str]),
}

pub struct CommandRoute {
    pub name: &'static str,
    matcher: Matcher,
    parse: fn(&str) -> Result<Command>,
}

impl CommandRoute {
    /// Arguments after the marker if this route matches `text`.
    fn arguments<'a>(&self, text: &'a str) -> Option<&'a str> {
        match self.matcher {
            Matcher::Exact(word) => text.eq_ignore_ascii_case(word).then_some(""),
            Matcher::Marker(markers) => markers.iter().find_map(|m| strip_marker(text, m)),
        }
    }
}

/// Routes in priority order.
pub const ROUTES: &[CommandRoute] = &[
    CommandRoute {
        name: "ping",
        matcher: Matcher::Exact("ping"),
        parse: parse_ping,
    },
    CommandRoute {
        name: "meal",
        matcher: Matcher::Marker(&["!meal"]),
        parse: parse_show_meal,
    },
    CommandRoute {
        name: "setmeal",
        matcher: Matcher::Marker(&["!setmeal"]),
        parse: parse_set_meal,
    },
    CommandRoute {
        name: "ask",
        matcher: Matcher::Marker(&["!ask", "/gpt"]),
        parse: parse_ask,
    },
];

/// Classify a message. `Err` carries a user-facing validation warning.
pub fn route(text: &str) -> Result<Command> {
    let text = text.trim();
    for route in ROUTES {
        if let Some(args) = route.arguments(text) {
            tracing::debug!("Router: matched route '{}'", route.name);
            return (route.parse)(args);
        }
    }
    Ok(Command::Chatter)
}

/// Case-insensitive ASCII marker followed by whitespace or end of text.
fn strip_marker<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let head = text.get(..marker.len())?;
    if !head.eq_ignore_ascii_case(marker) {
        return None;
    }
    let rest = &text[marker.len()..];
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

fn parse_ping(_args: &str) -> Result<Command> {
    Ok(Command::Ping)
}

fn parse_show_meal(args: &str) -> Result<Command> {
    let mut tokens = args.split_whitespace();
    let day = match (tokens.next(), tokens.next()) {
        (None, _) => None,
        (Some(token), None) => match token.parse::<usize>() {
            Ok(day) if day < DAYS_IN_WEEK => Some(day),
            _ => return Err(BotError::Validation(replies::MEAL_DAY_RANGE.to_string())),
        },
        (Some(_), Some(_)) => {
            return Err(BotError::Validation(replies::MEAL_DAY_RANGE.to_string()));
        }
    };
    Ok(Command::ShowMeal { day })
}

static SETMEAL_ARGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(\d+)\s+["\u{201c}](.+)["\u{201d}]$"#).expect("setmeal pattern is valid")
});

fn parse_set_meal(args: &str) -> Result<Command> {
    let format_error = || BotError::Validation(replies::SETMEAL_FORMAT.to_string());

    let caps = SETMEAL_ARGS.captures(args).ok_or_else(format_error)?;
    let day = match caps[1].parse::<usize>() {
        Ok(day) if day <= SETMEAL_MAX_DAY => day,
        _ => return Err(BotError::Validation(replies::SETMEAL_DAY_RANGE.to_string())),
    };

    let dishes = split_dishes(&caps[2]);
    if dishes.is_empty() {
        return Err(format_error());
    }

    Ok(Command::SetMeal { day, dishes })
}

/// Comma-separated dish list; blank items are dropped.
pub fn split_dishes(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_ask(args: &str) -> Result<Command> {
    if args.is_empty() {
        return Err(BotError::Validation(replies::ASK_EMPTY.to_string()));
    }
    Ok(Command::Ask {
        prompt: args.to_string(),
    })
}
