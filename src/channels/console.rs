//! Console Session
//!
//! Reads chat lines from stdin and prints replies to stdout. A line starting
//! with `g:` is delivered as a group message. End of input shuts the bot
//! down.

use crate::error::Result;
use crate::session::{
    ChatId, ConnectionUpdate, GROUP_SERVER, InboundMessage, OutboundMessage, Session,
    SessionEvent, USER_SERVER,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const GROUP_PREFIX: &str = "g:";

pub struct ConsoleSession {
    events: mpsc::Sender<SessionEvent>,
    reading: AtomicBool,
}

impl ConsoleSession {
    pub fn new(events: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            events,
            reading: AtomicBool::new(false),
        }
    }

    fn spawn_reader(&self) {
        let events = self.events.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(message) = parse_line(&line) else {
                            continue;
                        };
                        if events.send(SessionEvent::Message(message)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        tracing::info!("Console: end of input");
                        let _ = events.send(SessionEvent::Shutdown).await;
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Console: failed to read stdin: {}", e);
                        let _ = events.send(SessionEvent::Shutdown).await;
                        break;
                    }
                }
            }
        });
    }
}

/// Turn one console line into an inbound message; blank lines are skipped.
pub fn parse_line(line: &str) -> Option<InboundMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let sender = ChatId::new(format!("console@{}", USER_SERVER));
    let (is_group, text, conversation) = match line.strip_prefix(GROUP_PREFIX) {
        Some(rest) => (
            true,
            rest.trim(),
            ChatId::new(format!("console@{}", GROUP_SERVER)),
        ),
        None => (false, line, sender.clone()),
    };

    Some(InboundMessage {
        sender_id: sender,
        conversation_id: conversation,
        is_group,
        text: Some(text.to_string()),
        timestamp: chrono::Utc::now(),
        from_me: false,
    })
}

fn render(to: &ChatId, message: &OutboundMessage) -> String {
    format!("[{}] {}", to, message.text)
}

#[async_trait]
impl Session for ConsoleSession {
    async fn connect(&self) -> Result<()> {
        let _ = self
            .events
            .send(SessionEvent::Connection(ConnectionUpdate::Connecting))
            .await;
        if !self.reading.swap(true, Ordering::SeqCst) {
            self.spawn_reader();
            println!("wabot console: type a message, `g:` prefix for group chat, Ctrl+D to quit");
        }
        let _ = self
            .events
            .send(SessionEvent::Connection(ConnectionUpdate::Open))
            .await;
        Ok(())
    }

    async fn send(&self, to: &ChatId, message: OutboundMessage) -> Result<()> {
        println!("{}", render(to, &message));
        Ok(())
    }

    async fn is_registered(&self, _id: &ChatId) -> Result<bool> {
        Ok(true)
    }
}
