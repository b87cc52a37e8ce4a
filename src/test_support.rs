//! Hand-written fakes shared by unit tests.

use crate::completion::CompletionService;
use crate::error::{BotError, Result};
use crate::menu::{MenuRecord, MenuStore};
use crate::session::{ChatId, InboundMessage, OutboundMessage, Session};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

/// Session that records every send and counts connect calls.
#[derive(Default)]
pub struct FakeSession {
    connects: AtomicU32,
    connect_failures: AtomicU32,
    logout_on_connect: AtomicBool,
    connect_delay: Mutex<Option<Duration>>,
    send_delay: Mutex<Option<Duration>>,
    send_failures: AtomicUsize,
    unregistered: AtomicBool,
    sent: Mutex<Vec<(ChatId, OutboundMessage)>>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` connect calls.
    pub fn fail_connects(&self, n: u32) {
        self.connect_failures.store(n, Ordering::SeqCst);
    }

    pub fn logout_on_connect(&self) {
        self.logout_on_connect.store(true, Ordering::SeqCst);
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock().unwrap() = Some(delay);
    }

    /// Delay every send and registration lookup by `delay`.
    pub fn set_send_delay(&self, delay: Duration) {
        *self.send_delay.lock().unwrap() = Some(delay);
    }

    pub fn clear_send_delay(&self) {
        *self.send_delay.lock().unwrap() = None;
    }

    async fn wait_send_delay(&self) {
        let delay = *self.send_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// Fail the next `n` sends.
    pub fn fail_sends(&self, n: usize) {
        self.send_failures.store(n, Ordering::SeqCst);
    }

    pub fn mark_unregistered(&self) {
        self.unregistered.store(true, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(ChatId, OutboundMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, m)| m.text).collect()
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn connect(&self) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let delay = *self.connect_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.logout_on_connect.load(Ordering::SeqCst) {
            return Err(BotError::LoggedOut);
        }
        let remaining = self.connect_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.connect_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(BotError::Upstream("connection refused".to_string()));
        }
        Ok(())
    }

    async fn send(&self, to: &ChatId, message: OutboundMessage) -> Result<()> {
        self.wait_send_delay().await;
        let remaining = self.send_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.send_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(BotError::Upstream("socket closed".to_string()));
        }
        self.sent.lock().unwrap().push((to.clone(), message));
        Ok(())
    }

    async fn is_registered(&self, _id: &ChatId) -> Result<bool> {
        self.wait_send_delay().await;
        Ok(!self.unregistered.load(Ordering::SeqCst))
    }
}

/// Completion service with scripted answers.
#[derive(Default)]
pub struct FakeCompletion {
    answers: Mutex<VecDeque<Result<String>>>,
    delay: Mutex<Option<Duration>>,
    prompts: Mutex<Vec<String>>,
}

impl FakeCompletion {
    pub fn answering(answer: &str) -> Self {
        let fake = Self::default();
        fake.push(Ok(answer.to_string()));
        fake
    }

    pub fn push(&self, answer: Result<String>) {
        self.answers.lock().unwrap().push_back(answer);
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Wait `delay` before answering each prompt.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl CompletionService for FakeCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

/// In-memory menu store; `None` behaves like a missing file.
#[derive(Default)]
pub struct MemoryMenuStore {
    record: Mutex<Option<MenuRecord>>,
    broken: AtomicBool,
}

impl MemoryMenuStore {
    pub fn with_days(days: Vec<Vec<&str>>) -> Self {
        let days = days
            .into_iter()
            .map(|d| d.into_iter().map(str::to_string).collect())
            .collect();
        Self {
            record: Mutex::new(Some(MenuRecord::from_days(days).unwrap())),
            broken: AtomicBool::new(false),
        }
    }

    /// Every operation fails with a persistence error.
    pub fn broken() -> Self {
        let store = Self::default();
        store.broken.store(true, Ordering::SeqCst);
        store
    }

    pub fn snapshot(&self) -> Option<MenuRecord> {
        self.record.lock().unwrap().clone()
    }
}

#[async_trait]
impl MenuStore for MemoryMenuStore {
    async fn get_all(&self) -> Result<MenuRecord> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(BotError::Persistence("disk on fire".to_string()));
        }
        self.record
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| BotError::NotFound(crate::menu::MENU_MISSING.to_string()))
    }

    async fn set_day(&self, day: usize, dishes: Vec<String>) -> Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(BotError::Persistence("disk on fire".to_string()));
        }
        crate::menu::check_day(day)?;
        let mut guard = self.record.lock().unwrap();
        let record = guard.get_or_insert_with(MenuRecord::default);
        record.set_day(day, dishes)
    }
}

pub fn direct_message(sender: &str, text: &str) -> InboundMessage {
    let id = ChatId::from_number(sender);
    InboundMessage {
        sender_id: id.clone(),
        conversation_id: id,
        is_group: false,
        text: Some(text.to_string()),
        timestamp: chrono::Utc::now(),
        from_me: false,
    }
}

pub fn group_message(sender: &str, group: &str, text: &str) -> InboundMessage {
    InboundMessage {
        sender_id: ChatId::from_number(sender),
        conversation_id: ChatId::new(format!("{}@{}", group, crate::session::GROUP_SERVER)),
        is_group: true,
        text: Some(text.to_string()),
        timestamp: chrono::Utc::now(),
        from_me: false,
    }
}
