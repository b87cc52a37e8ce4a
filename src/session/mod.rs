//! Session Capability
//!
//! The contract between the dispatcher and whatever maintains the messaging
//! connection. Adapters live under `crate::channels`; they push
//! [`SessionEvent`]s onto the channel they were built with and expose a
//! [`Session`] handle for outbound calls.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

/// JID suffix for one-to-one chats.
pub const USER_SERVER: &str = "s.whatsapp.net";
/// JID suffix for group chats.
pub const GROUP_SERVER: &str = "g.us";

/// A WhatsApp JID, e.g. `6281234567890@s.whatsapp.net` or `1203...@g.us`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatId(String);

impl ChatId {
    pub fn new(jid: impl Into<String>) -> Self {
        Self(jid.into())
    }

    /// Normalise user input into a JID.
    ///
    /// Anything containing `@` is taken as a full JID. A bare number has
    /// `+`, spaces and dashes stripped and gets the user server appended.
    pub fn from_number(input: &str) -> Self {
        let input = input.trim();
        if input.contains('@') {
            return Self(input.to_string());
        }
        let digits: String = input
            .chars()
            .filter(|c| !matches!(c, '+' | ' ' | '-'))
            .collect();
        Self(format!("{}@{}", digits, USER_SERVER))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_group(&self) -> bool {
        self.0.ends_with(&format!("@{}", GROUP_SERVER))
    }

    /// The part before `@` (the phone number for user JIDs).
    pub fn user(&self) -> &str {
        self.0.split('@').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message received from a remote participant. Not persisted.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Who wrote it (the participant, for group messages).
    pub sender_id: ChatId,
    /// Where to reply.
    pub conversation_id: ChatId,
    pub is_group: bool,
    pub text: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Sent by the account the bot is logged in as.
    pub from_me: bool,
}

/// A reply or notification to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub mentions: Vec<ChatId>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mentions: Vec::new(),
        }
    }

    pub fn with_mention(mut self, who: ChatId) -> Self {
        self.mentions.push(who);
        self
    }
}

/// Why a connection closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The device was unlinked from the phone. No reconnect.
    LoggedOut,
    /// Anything else: network drop, server restart, stream error.
    Transient(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionUpdate {
    Connecting,
    Open,
    Closed(CloseReason),
}

/// Everything a session provider can report.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Connection(ConnectionUpdate),
    Message(InboundMessage),
    /// The provider has nothing more to deliver (e.g. stdin closed).
    Shutdown,
}

/// Connection state as tracked by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    LoggedOut,
}

/// Handle to an authenticated messaging session.
#[async_trait]
pub trait Session: Send + Sync {
    /// Establish, or re-establish, the connection. Connection and message
    /// events are delivered on the provider's event channel.
    async fn connect(&self) -> Result<()>;

    /// Send a message to a chat.
    async fn send(&self, to: &ChatId, message: OutboundMessage) -> Result<()>;

    /// Whether a user JID belongs to a WhatsApp account.
    async fn is_registered(&self, id: &ChatId) -> Result<bool>;
}
