//! wabot - WhatsApp chat bot
//!
//! Answers a small command set in private and group chats:
//!
//! - `ping` replies `Oi` (private) or `Hai` (group)
//! - `!meal [0-6]` shows the stored menu for today or a given day
//! - `!setmeal <0-5> "dish, dish"` stores a day's menu
//! - `!ask <text>` / `/gpt <text>` forwards the question to an LLM
//! - a group greeting gets a reply that mentions the sender
//!
//! An optional HTTP endpoint (`POST /send-meal`) pushes today's menu to a
//! number or group.

pub mod app;
pub mod bot;
pub mod channels;
pub mod cli;
pub mod completion;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod menu;
pub mod session;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{BotError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
