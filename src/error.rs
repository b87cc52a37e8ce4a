//! Error Types
//!
//! Domain error taxonomy for the bot. Validation and not-found errors carry
//! text meant for the chat user; upstream and persistence errors carry
//! operator detail that must stay in the logs.

use thiserror::Error;

/// Result alias used across the bot's capabilities.
pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Debug, Error)]
pub enum BotError {
    /// Bad command syntax or out-of-range day index. The message is shown to the user.
    #[error("{0}")]
    Validation(String),

    /// Missing menu data or unregistered number. The message is shown to the user.
    #[error("{0}")]
    NotFound(String),

    /// Completion service or session provider failure.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Menu store read/write failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// An outbound call did not finish in time.
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// The session was logged out from the phone. Terminal.
    #[error("session logged out; pair the device again")]
    LoggedOut,

    /// Re-establishing the session failed too many times in a row.
    #[error("failed to re-establish session after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("configuration error: {0}")]
    Config(String),
}

impl BotError {
    /// Text to show the chat user for this error.
    ///
    /// Validation and not-found errors are surfaced verbatim; everything else
    /// is replaced by `generic` so internal detail never reaches the chat.
    pub fn user_warning(&self, generic: &str) -> String {
        match self {
            Self::Validation(msg) | Self::NotFound(msg) => msg.clone(),
            _ => generic.to_string(),
        }
    }

    /// Whether this error ends the dispatch loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::LoggedOut | Self::ReconnectExhausted { .. })
    }
}

impl From<std::io::Error> for BotError {
    fn from(e: std::io::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for BotError {
    fn from(e: serde_json::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl From<reqwest::Error> for BotError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout("completion request")
        } else {
            Self::Upstream(e.to_string())
        }
    }
}
