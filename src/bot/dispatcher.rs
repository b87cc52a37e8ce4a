//! Event Dispatcher
//!
//! Consumes [`SessionEvent`]s one at a time. Connection updates drive the
//! connection state machine; messages are routed and answered. A failure
//! while handling one message is logged and never stops the loop. Only a
//! logout or exhausted reconnect attempts end [`Dispatcher::run`] with an
//! error.

use super::reconnect;
use super::replies;
use super::router::{self, Command};
use crate::completion::CompletionService;
use crate::config::Config;
use crate::error::{BotError, Result};
use crate::menu::{self, MenuStore};
use crate::session::{
    ChatId, CloseReason, ConnectionState, ConnectionUpdate, InboundMessage, OutboundMessage,
    Session, SessionEvent,
};
use crate::utils::{self, RetryConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Longest single chat message; longer completions are split.
pub const MAX_REPLY_LEN: usize = 4000;

/// Returns today's Monday-based day index.
pub type TodayFn = Arc<dyn Fn() -> usize + Send + Sync>;

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub reply_enabled: bool,
    pub greeting_keywords: Vec<String>,
    pub direct_fallback_reply: Option<String>,
    pub send_timeout: Duration,
    pub completion_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl DispatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            reply_enabled: config.dispatch.reply_enabled,
            greeting_keywords: config
                .dispatch
                .greeting_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            direct_fallback_reply: config.dispatch.direct_fallback_reply.clone(),
            send_timeout: Duration::from_secs(config.dispatch.send_timeout_secs),
            completion_timeout: Duration::from_secs(config.openai.timeout_secs),
        }
    }
}

enum Flow {
    Continue,
    Stop,
}

pub struct Dispatcher {
    session: Arc<dyn Session>,
    menu: Arc<dyn MenuStore>,
    completion: Option<Arc<dyn CompletionService>>,
    settings: DispatchSettings,
    retry: RetryConfig,
    today: TodayFn,
    state: ConnectionState,
    reconnect_task: Option<JoinHandle<()>>,
    fatal_tx: mpsc::UnboundedSender<BotError>,
    fatal_rx: mpsc::UnboundedReceiver<BotError>,
}

impl Dispatcher {
    pub fn new(
        session: Arc<dyn Session>,
        menu: Arc<dyn MenuStore>,
        settings: DispatchSettings,
        retry: RetryConfig,
    ) -> Self {
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        Self {
            session,
            menu,
            completion: None,
            settings,
            retry,
            today: Arc::new(menu::today_index),
            state: ConnectionState::Disconnected,
            reconnect_task: None,
            fatal_tx,
            fatal_rx,
        }
    }

    pub fn with_completion(mut self, completion: Arc<dyn CompletionService>) -> Self {
        self.completion = Some(completion);
        self
    }

    /// Override the clock used by `!meal` without a day argument.
    pub fn with_today(mut self, today: TodayFn) -> Self {
        self.today = today;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Begin the first connection in the background, using the same
    /// backoff policy as reconnects.
    pub fn start_session(&mut self) {
        self.transition(ConnectionState::Connecting, "startup");
        self.spawn_reconnect();
    }

    /// Process events until shutdown, channel close, or a fatal error.
    pub async fn run(mut self, mut events: mpsc::Receiver<SessionEvent>) -> Result<()> {
        tracing::info!("Dispatcher: started");

        let outcome = loop {
            tokio::select! {
                biased;
                Some(fatal) = self.fatal_rx.recv() => break Err(fatal),
                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::info!("Dispatcher: event channel closed");
                        break Ok(());
                    };
                    match self.handle_event(event).await {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Stop) => break Ok(()),
                        Err(e) => break Err(e),
                    }
                }
            }
        };

        self.abort_reconnect();
        match &outcome {
            Ok(()) => tracing::info!("Dispatcher: stopped"),
            Err(e) if e.is_fatal() => tracing::error!("Dispatcher: session lost: {}", e),
            Err(e) => tracing::error!("Dispatcher: stopped: {}", e),
        }
        outcome
    }

    async fn handle_event(&mut self, event: SessionEvent) -> Result<Flow> {
        match event {
            SessionEvent::Connection(update) => {
                self.on_connection_update(update)?;
                Ok(Flow::Continue)
            }
            SessionEvent::Message(message) => {
                self.handle_message(&message).await;
                Ok(Flow::Continue)
            }
            SessionEvent::Shutdown => {
                tracing::info!("Dispatcher: shutdown requested");
                Ok(Flow::Stop)
            }
        }
    }

    fn on_connection_update(&mut self, update: ConnectionUpdate) -> Result<()> {
        if self.state == ConnectionState::LoggedOut {
            tracing::debug!("Session: ignoring {:?} after logout", update);
            return Ok(());
        }

        match update {
            ConnectionUpdate::Connecting => {
                self.transition(ConnectionState::Connecting, "connecting");
            }
            ConnectionUpdate::Open => {
                self.transition(ConnectionState::Open, "connection open");
            }
            ConnectionUpdate::Closed(CloseReason::LoggedOut) => {
                self.transition(ConnectionState::LoggedOut, "logged out");
                self.abort_reconnect();
                tracing::error!(
                    "Session: logged out. Delete the stored session and pair the device again."
                );
                return Err(BotError::LoggedOut);
            }
            ConnectionUpdate::Closed(CloseReason::Transient(reason)) => {
                self.transition(ConnectionState::Disconnected, &reason);
                self.transition(ConnectionState::Connecting, "reconnecting");
                self.spawn_reconnect();
            }
        }
        Ok(())
    }

    fn transition(&mut self, next: ConnectionState, reason: &str) {
        if self.state != next {
            tracing::info!("Session: {:?} -> {:?} ({})", self.state, next, reason);
        }
        self.state = next;
    }

    fn spawn_reconnect(&mut self) {
        if let Some(task) = &self.reconnect_task
            && !task.is_finished()
        {
            tracing::debug!("Session: reconnect already in progress");
            return;
        }

        let session = Arc::clone(&self.session);
        let retry = self.retry.clone();
        let fatal_tx = self.fatal_tx.clone();
        self.reconnect_task = Some(tokio::spawn(async move {
            match reconnect::establish(session.as_ref(), &retry).await {
                Ok(attempt) => tracing::info!("Session: connected on attempt {}", attempt),
                Err(e) => {
                    tracing::error!("Session: giving up: {}", e);
                    let _ = fatal_tx.send(e);
                }
            }
        }));
    }

    fn abort_reconnect(&mut self) {
        if let Some(task) = self.reconnect_task.take() {
            task.abort();
        }
    }

    #[cfg(test)]
    async fn join_reconnect(&mut self) {
        if let Some(task) = self.reconnect_task.take() {
            let _ = task.await;
        }
    }

    /// Route one inbound message and send whatever replies it produces.
    pub async fn handle_message(&self, message: &InboundMessage) {
        if message.from_me {
            tracing::debug!("Dispatcher: skipping own message");
            return;
        }
        let Some(text) = message
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        else {
            tracing::debug!(
                "Dispatcher: no text in message from {}",
                message.sender_id
            );
            return;
        };

        if message.is_group {
            tracing::info!(
                "Message: [GROUP {}] {}: {}",
                message.conversation_id,
                message.sender_id,
                utils::truncate_str(text, 200)
            );
        } else {
            tracing::info!(
                "Message: [PRIVATE] {}: {}",
                message.sender_id,
                utils::truncate_str(text, 200)
            );
        }

        let replies = match router::route(text) {
            Ok(command) => self.execute(message, command).await,
            Err(e) => vec![OutboundMessage::text(e.to_string())],
        };

        for reply in replies {
            self.reply(&message.conversation_id, reply).await;
        }
    }

    async fn execute(&self, message: &InboundMessage, command: Command) -> Vec<OutboundMessage> {
        match command {
            Command::Ping => {
                let text = if message.is_group {
                    replies::PING_GROUP
                } else {
                    replies::PING_DIRECT
                };
                vec![OutboundMessage::text(text)]
            }
            Command::ShowMeal { day } => {
                let day = day.unwrap_or_else(|| (self.today)());
                let text = match self.menu.get_all().await {
                    Ok(record) => menu::render_day(&record, day),
                    Err(e) => {
                        if !matches!(e, BotError::NotFound(_)) {
                            tracing::error!("Menu: read failed: {}", e);
                        }
                        e.user_warning(replies::MEAL_READ_FAILED)
                    }
                };
                vec![OutboundMessage::text(text)]
            }
            Command::SetMeal { day, dishes } => {
                let text = match self.menu.set_day(day, dishes).await {
                    Ok(()) => replies::setmeal_saved(day),
                    Err(e) => {
                        tracing::error!("Menu: save for day {} failed: {}", day, e);
                        e.user_warning(replies::SETMEAL_SAVE_FAILED)
                    }
                };
                vec![OutboundMessage::text(text)]
            }
            Command::Ask { prompt } => self.ask(&prompt).await,
            Command::Chatter => self.chatter(message),
        }
    }

    async fn ask(&self, prompt: &str) -> Vec<OutboundMessage> {
        let Some(completion) = &self.completion else {
            tracing::warn!("Completion: no service configured (set OPENAI_API_KEY)");
            return vec![OutboundMessage::text(replies::ASK_FAILED)];
        };

        let answer =
            match tokio::time::timeout(self.settings.completion_timeout, completion.complete(prompt))
                .await
            {
                Ok(Ok(answer)) => answer,
                Ok(Err(e)) => {
                    tracing::error!("Completion: request failed: {}", e);
                    return vec![OutboundMessage::text(replies::ASK_FAILED)];
                }
                Err(_) => {
                    tracing::error!(
                        "Completion: no answer within {:?}",
                        self.settings.completion_timeout
                    );
                    return vec![OutboundMessage::text(replies::ASK_FAILED)];
                }
            };

        let answer = answer.trim();
        if answer.is_empty() {
            return vec![OutboundMessage::text(replies::ASK_EMPTY_ANSWER)];
        }
        utils::split_message(answer, MAX_REPLY_LEN)
            .into_iter()
            .map(OutboundMessage::text)
            .collect()
    }

    fn chatter(&self, message: &InboundMessage) -> Vec<OutboundMessage> {
        let text = message.text.as_deref().unwrap_or_default().to_lowercase();

        if message.is_group {
            let greeted = self
                .settings
                .greeting_keywords
                .iter()
                .any(|k| !k.is_empty() && text.contains(k.as_str()));
            if greeted {
                let sender = &message.sender_id;
                return vec![
                    OutboundMessage::text(replies::group_greeting(sender.user()))
                        .with_mention(sender.clone()),
                ];
            }
            return Vec::new();
        }

        match &self.settings.direct_fallback_reply {
            Some(fallback) => vec![OutboundMessage::text(fallback.clone())],
            None => Vec::new(),
        }
    }

    async fn reply(&self, to: &ChatId, message: OutboundMessage) {
        if !self.settings.reply_enabled {
            tracing::info!(
                "Dispatcher: replies disabled, not sending to {}: {}",
                to,
                utils::truncate_str(&message.text, 200)
            );
            return;
        }

        match tokio::time::timeout(self.settings.send_timeout, self.session.send(to, message))
            .await
        {
            Ok(Ok(())) => tracing::debug!("Dispatcher: replied to {}", to),
            Ok(Err(e)) => tracing::error!("Dispatcher: failed to send reply to {}: {}", to, e),
            Err(_) => tracing::error!(
                "Dispatcher: sending to {} timed out after {:?}",
                to,
                self.settings.send_timeout
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        FakeCompletion, FakeSession, MemoryMenuStore, direct_message, group_message,
    };

    struct Harness {
        session: Arc<FakeSession>,
        store: Arc<MemoryMenuStore>,
        dispatcher: Dispatcher,
    }

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            max_attempts,
            attempt_timeout: Duration::from_millis(200),
        }
    }

    fn settings() -> DispatchSettings {
        DispatchSettings {
            send_timeout: Duration::from_millis(500),
            completion_timeout: Duration::from_millis(500),
            ..DispatchSettings::default()
        }
    }

    fn harness_with(store: MemoryMenuStore, settings: DispatchSettings) -> Harness {
        let session = Arc::new(FakeSession::new());
        let store = Arc::new(store);
        let dispatcher = Dispatcher::new(session.clone(), store.clone(), settings, fast_retry(3))
            .with_today(Arc::new(|| 2));
        Harness {
            session,
            store,
            dispatcher,
        }
    }

    fn harness() -> Harness {
        harness_with(MemoryMenuStore::default(), settings())
    }

    #[tokio::test]
    async fn test_ping_private_and_group() {
        let h = harness();
        h.dispatcher.handle_message(&direct_message("628111", "ping")).await;
        h.dispatcher
            .handle_message(&group_message("628111", "1203", "PING"))
            .await;
        assert_eq!(h.session.sent_texts(), vec!["Oi", "Hai"]);

        let sent = h.session.sent();
        assert_eq!(sent[0].0.as_str(), "628111@s.whatsapp.net");
        assert_eq!(sent[1].0.as_str(), "1203@g.us");
    }

    #[tokio::test]
    async fn test_setmeal_then_meal() {
        let h = harness();
        h.dispatcher
            .handle_message(&direct_message("628111", r#"!setmeal 2 "soto, sate""#))
            .await;
        h.dispatcher.handle_message(&direct_message("628111", "!meal 2")).await;

        assert_eq!(
            h.session.sent_texts(),
            vec![
                "\u{2705} Menu untuk hari ke-2 berhasil disimpan.".to_string(),
                "\u{1f37d} *Menu Hari Rabu:*\n1. soto\n2. sate".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_meal_without_day_uses_today() {
        let h = harness_with(
            MemoryMenuStore::with_days(vec![vec!["a"], vec!["b"], vec!["nasi uduk"]]),
            settings(),
        );
        h.dispatcher.handle_message(&direct_message("628111", "!meal")).await;
        assert_eq!(
            h.session.sent_texts(),
            vec!["\u{1f37d} *Menu Hari Rabu:*\n1. nasi uduk"]
        );
    }

    #[tokio::test]
    async fn test_meal_for_missing_day_shows_placeholder() {
        let h = harness_with(MemoryMenuStore::with_days(vec![vec!["a"]]), settings());
        h.dispatcher.handle_message(&direct_message("628111", "!meal 6")).await;
        assert_eq!(
            h.session.sent_texts(),
            vec![format!("\u{1f37d} *Menu Hari Minggu:*\n1. {}", menu::PLACEHOLDER_DISH)]
        );
    }

    #[tokio::test]
    async fn test_meal_out_of_range_leaves_store_untouched() {
        let h = harness();
        h.dispatcher.handle_message(&direct_message("628111", "!meal 9")).await;
        assert_eq!(h.session.sent_texts(), vec![replies::MEAL_DAY_RANGE]);
        assert!(h.store.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_meal_without_file_reports_missing() {
        let h = harness();
        h.dispatcher.handle_message(&direct_message("628111", "!meal 1")).await;
        assert_eq!(h.session.sent_texts(), vec![menu::MENU_MISSING]);
    }

    #[tokio::test]
    async fn test_store_failures_use_generic_warnings() {
        let h = harness_with(MemoryMenuStore::broken(), settings());
        h.dispatcher.handle_message(&direct_message("628111", "!meal 1")).await;
        h.dispatcher
            .handle_message(&direct_message("628111", r#"!setmeal 1 "soto""#))
            .await;
        assert_eq!(
            h.session.sent_texts(),
            vec![replies::MEAL_READ_FAILED, replies::SETMEAL_SAVE_FAILED]
        );
    }

    #[tokio::test]
    async fn test_empty_ask_never_calls_completion() {
        let h = harness();
        let completion = Arc::new(FakeCompletion::answering("unused"));
        let dispatcher = h.dispatcher.with_completion(completion.clone());

        dispatcher.handle_message(&direct_message("628111", "!ask")).await;
        dispatcher.handle_message(&direct_message("628111", "/gpt   ")).await;

        assert!(completion.prompts().is_empty());
        assert_eq!(
            h.session.sent_texts(),
            vec![replies::ASK_EMPTY, replies::ASK_EMPTY]
        );
    }

    #[tokio::test]
    async fn test_ask_forwards_prompt_and_replies() {
        let h = harness();
        let completion = Arc::new(FakeCompletion::answering("  Rendang adalah masakan Minang.\n"));
        let dispatcher = h.dispatcher.with_completion(completion.clone());

        dispatcher
            .handle_message(&group_message("628111", "1203", "/gpt Apa itu Rendang?"))
            .await;

        assert_eq!(completion.prompts(), vec!["Apa itu Rendang?"]);
        assert_eq!(h.session.sent_texts(), vec!["Rendang adalah masakan Minang."]);
    }

    #[tokio::test]
    async fn test_long_answer_is_split() {
        let h = harness();
        let long = "kata ".repeat(1800);
        let completion = Arc::new(FakeCompletion::answering(&long));
        let dispatcher = h.dispatcher.with_completion(completion);

        dispatcher.handle_message(&direct_message("628111", "!ask cerita")).await;

        let sent = h.session.sent_texts();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|chunk| chunk.len() <= MAX_REPLY_LEN));
    }

    #[tokio::test]
    async fn test_completion_failure_then_next_message_still_handled() {
        let h = harness();
        let completion = Arc::new(FakeCompletion::default());
        completion.push(Err(BotError::Upstream("500".to_string())));
        completion.push(Ok(String::new()));
        let dispatcher = h.dispatcher.with_completion(completion);

        dispatcher.handle_message(&direct_message("628111", "!ask a")).await;
        dispatcher.handle_message(&direct_message("628111", "!ask b")).await;
        dispatcher.handle_message(&direct_message("628111", "ping")).await;

        assert_eq!(
            h.session.sent_texts(),
            vec![replies::ASK_FAILED, replies::ASK_EMPTY_ANSWER, replies::PING_DIRECT]
        );
    }

    #[tokio::test]
    async fn test_hung_completion_times_out_and_next_message_still_handled() {
        let h = harness();
        let completion = Arc::new(FakeCompletion::answering("terlambat"));
        completion.set_delay(Duration::from_secs(3600));
        let dispatcher = h.dispatcher.with_completion(completion.clone());

        tokio::time::timeout(
            Duration::from_secs(5),
            dispatcher.handle_message(&direct_message("628111", "!ask lama sekali")),
        )
        .await
        .expect("completion wait should be bounded");
        dispatcher.handle_message(&direct_message("628111", "ping")).await;

        assert_eq!(completion.prompts(), vec!["lama sekali"]);
        assert_eq!(
            h.session.sent_texts(),
            vec![replies::ASK_FAILED, replies::PING_DIRECT]
        );
    }

    #[tokio::test]
    async fn test_ask_without_service_warns() {
        let h = harness();
        h.dispatcher.handle_message(&direct_message("628111", "!ask halo")).await;
        assert_eq!(h.session.sent_texts(), vec![replies::ASK_FAILED]);
    }

    #[tokio::test]
    async fn test_send_failure_does_not_stop_next_message() {
        let h = harness();
        h.session.fail_sends(1);
        h.dispatcher.handle_message(&direct_message("628111", "ping")).await;
        h.dispatcher.handle_message(&direct_message("628111", "ping")).await;
        assert_eq!(h.session.sent_texts(), vec!["Oi"]);
    }

    #[tokio::test]
    async fn test_hung_send_is_abandoned_and_next_message_still_handled() {
        let h = harness();
        h.session.set_send_delay(Duration::from_secs(3600));

        tokio::time::timeout(
            Duration::from_secs(5),
            h.dispatcher.handle_message(&direct_message("628111", "ping")),
        )
        .await
        .expect("send wait should be bounded");
        assert!(h.session.sent().is_empty());

        h.session.clear_send_delay();
        h.dispatcher.handle_message(&direct_message("628111", "ping")).await;
        assert_eq!(h.session.sent_texts(), vec!["Oi"]);
    }

    #[tokio::test]
    async fn test_group_greeting_mentions_sender() {
        let h = harness();
        h.dispatcher
            .handle_message(&group_message("628111", "1203", "Halo semuanya!"))
            .await;

        let sent = h.session.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.text, "Hai \u{1f44b} @628111");
        assert_eq!(sent[0].1.mentions, vec![ChatId::from_number("628111")]);
    }

    #[tokio::test]
    async fn test_chatter_is_ignored_by_default() {
        let h = harness();
        h.dispatcher.handle_message(&direct_message("628111", "halo")).await;
        h.dispatcher
            .handle_message(&group_message("628111", "1203", "selamat pagi"))
            .await;
        assert!(h.session.sent().is_empty());
    }

    #[tokio::test]
    async fn test_direct_fallback_when_configured() {
        let h = harness_with(
            MemoryMenuStore::default(),
            DispatchSettings {
                direct_fallback_reply: Some("Nande".to_string()),
                ..settings()
            },
        );
        h.dispatcher.handle_message(&direct_message("628111", "hmm")).await;
        assert_eq!(h.session.sent_texts(), vec!["Nande"]);
    }

    #[tokio::test]
    async fn test_own_and_empty_messages_are_skipped() {
        let h = harness();
        let mut own = direct_message("628111", "ping");
        own.from_me = true;
        let mut media = direct_message("628111", "");
        media.text = None;

        h.dispatcher.handle_message(&own).await;
        h.dispatcher.handle_message(&media).await;
        h.dispatcher.handle_message(&direct_message("628111", "   ")).await;
        assert!(h.session.sent().is_empty());
    }

    #[tokio::test]
    async fn test_replies_disabled_sends_nothing() {
        let h = harness_with(
            MemoryMenuStore::default(),
            DispatchSettings {
                reply_enabled: false,
                ..settings()
            },
        );
        h.dispatcher.handle_message(&direct_message("628111", "ping")).await;
        assert!(h.session.sent().is_empty());
    }

    #[tokio::test]
    async fn test_transient_close_reconnects() {
        let mut h = harness();
        h.dispatcher
            .on_connection_update(ConnectionUpdate::Open)
            .unwrap();
        h.dispatcher
            .on_connection_update(ConnectionUpdate::Closed(CloseReason::Transient(
                "stream error".to_string(),
            )))
            .unwrap();
        assert_eq!(h.dispatcher.state(), ConnectionState::Connecting);

        h.dispatcher.join_reconnect().await;
        assert_eq!(h.session.connect_calls(), 1);
    }

    #[tokio::test]
    async fn test_only_one_reconnect_task_at_a_time() {
        let mut h = harness();
        h.session.set_connect_delay(Duration::from_millis(50));
        for _ in 0..3 {
            h.dispatcher
                .on_connection_update(ConnectionUpdate::Closed(CloseReason::Transient(
                    "flaky".to_string(),
                )))
                .unwrap();
        }
        h.dispatcher.join_reconnect().await;
        assert_eq!(h.session.connect_calls(), 1);
    }

    #[tokio::test]
    async fn test_logout_is_terminal_and_never_reconnects() {
        let h = harness();
        let (tx, rx) = mpsc::channel(8);
        tx.send(SessionEvent::Connection(ConnectionUpdate::Open))
            .await
            .unwrap();
        tx.send(SessionEvent::Connection(ConnectionUpdate::Closed(
            CloseReason::LoggedOut,
        )))
        .await
        .unwrap();
        tx.send(SessionEvent::Message(direct_message("628111", "ping")))
            .await
            .unwrap();

        let err = h.dispatcher.run(rx).await.unwrap_err();
        assert!(matches!(err, BotError::LoggedOut));
        assert_eq!(h.session.connect_calls(), 0);
        assert!(h.session.sent().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_reconnect_is_fatal() {
        let h = harness();
        h.session.fail_connects(10);
        let (tx, rx) = mpsc::channel(8);
        tx.send(SessionEvent::Connection(ConnectionUpdate::Closed(
            CloseReason::Transient("gone".to_string()),
        )))
        .await
        .unwrap();

        let err = h.dispatcher.run(rx).await.unwrap_err();
        assert!(matches!(err, BotError::ReconnectExhausted { attempts: 3 }));
        assert_eq!(h.session.connect_calls(), 3);
        drop(tx);
    }

    #[tokio::test]
    async fn test_run_handles_messages_until_shutdown() {
        let h = harness();
        let (tx, rx) = mpsc::channel(8);
        tx.send(SessionEvent::Message(direct_message("628111", "ping")))
            .await
            .unwrap();
        tx.send(SessionEvent::Shutdown).await.unwrap();
        tx.send(SessionEvent::Message(direct_message("628111", "ping")))
            .await
            .unwrap();

        h.dispatcher.run(rx).await.unwrap();
        assert_eq!(h.session.sent_texts(), vec!["Oi"]);
    }

    #[tokio::test]
    async fn test_start_session_connects_in_background() {
        let mut h = harness();
        h.dispatcher.start_session();
        assert_eq!(h.dispatcher.state(), ConnectionState::Connecting);
        h.dispatcher.join_reconnect().await;
        assert_eq!(h.session.connect_calls(), 1);
    }
}
