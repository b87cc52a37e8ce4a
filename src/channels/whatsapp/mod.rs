//! WhatsApp Session
//!
//! Runs a WhatsApp Web client. Pairing state lives in a SQLite file; an
//! unpaired device prints a QR code to scan, or a pairing code when a
//! phone number is configured. Client events are translated and pushed
//! onto the dispatcher's queue.

pub(crate) mod handler;

use crate::error::{BotError, Result};
use crate::session::{
    ChatId, CloseReason, ConnectionUpdate, OutboundMessage, Session, SessionEvent,
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use wacore_binary::jid::Jid;
use whatsapp_rust::bot::Bot;
use whatsapp_rust::client::Client;
use whatsapp_rust::pair_code::PairCodeOptions;
use whatsapp_rust::store::SqliteStore;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Down,
    Up,
    LoggedOut,
}

pub struct WhatsAppSession {
    db_path: PathBuf,
    pair_phone: Option<String>,
    events: mpsc::Sender<SessionEvent>,
    client: Arc<Mutex<Option<Arc<Client>>>>,
    bot_task: Mutex<Option<JoinHandle<()>>>,
    link_tx: watch::Sender<LinkState>,
}

impl WhatsAppSession {
    pub fn new(
        db_path: PathBuf,
        pair_phone: Option<String>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let (link_tx, _) = watch::channel(LinkState::Down);
        Self {
            db_path,
            pair_phone,
            events,
            client: Arc::new(Mutex::new(None)),
            bot_task: Mutex::new(None),
            link_tx,
        }
    }

    /// Build a fresh client and start its event loop in the background.
    async fn start_bot(&self) -> Result<JoinHandle<()>> {
        if let Some(parent) = self.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let backend = SqliteStore::new(self.db_path.to_string_lossy().as_ref())
            .await
            .map_err(|e| {
                BotError::Persistence(format!(
                    "failed to open WhatsApp store {}: {}",
                    self.db_path.display(),
                    e
                ))
            })?;

        let events = self.events.clone();
        let client_slot = Arc::clone(&self.client);
        let link_tx = self.link_tx.clone();

        let mut builder = Bot::builder()
            .with_backend(Arc::new(backend))
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .on_event(move |event, client| {
                let events = events.clone();
                let client_slot = Arc::clone(&client_slot);
                let link_tx = link_tx.clone();
                async move {
                    let Some(translated) = handler::translate(&event) else {
                        return;
                    };
                    if let SessionEvent::Connection(update) = &translated {
                        match update {
                            ConnectionUpdate::Open => {
                                *client_slot.lock().await = Some(client);
                                link_tx.send_replace(LinkState::Up);
                            }
                            ConnectionUpdate::Closed(reason) => {
                                *client_slot.lock().await = None;
                                link_tx.send_replace(match reason {
                                    CloseReason::LoggedOut => LinkState::LoggedOut,
                                    CloseReason::Transient(_) => LinkState::Down,
                                });
                            }
                            ConnectionUpdate::Connecting => {}
                        }
                    }
                    if events.send(translated).await.is_err() {
                        tracing::debug!("WhatsApp: event queue closed");
                    }
                }
            });

        if let Some(phone) = &self.pair_phone {
            tracing::info!("WhatsApp: pairing-code login enabled for {}", phone);
            builder = builder.with_pair_code(PairCodeOptions {
                phone_number: phone.clone(),
                ..Default::default()
            });
        }

        let mut bot = builder
            .build()
            .await
            .map_err(|e| BotError::Upstream(format!("failed to build WhatsApp client: {}", e)))?;

        bot.run()
            .await
            .map_err(|e| BotError::Upstream(format!("failed to start WhatsApp client: {}", e)))
    }

    async fn connected_client(&self) -> Result<Arc<Client>> {
        self.client
            .lock()
            .await
            .clone()
            .ok_or_else(|| BotError::Upstream("WhatsApp is not connected".to_string()))
    }
}

#[async_trait]
impl Session for WhatsAppSession {
    /// Replace any running client and wait until the new one is connected
    /// or reports a logout. Callers bound the wait with a timeout.
    async fn connect(&self) -> Result<()> {
        if let Some(old) = self.bot_task.lock().await.take() {
            old.abort();
        }
        *self.client.lock().await = None;
        let mut link = self.link_tx.subscribe();
        self.link_tx.send_replace(LinkState::Down);

        let _ = self
            .events
            .send(SessionEvent::Connection(ConnectionUpdate::Connecting))
            .await;

        let handle = self.start_bot().await?;
        *self.bot_task.lock().await = Some(handle);

        loop {
            match *link.borrow_and_update() {
                LinkState::Up => return Ok(()),
                LinkState::LoggedOut => return Err(BotError::LoggedOut),
                LinkState::Down => {}
            }
            if link.changed().await.is_err() {
                return Err(BotError::Upstream("WhatsApp link closed".to_string()));
            }
        }
    }

    async fn send(&self, to: &ChatId, message: OutboundMessage) -> Result<()> {
        let client = self.connected_client().await?;
        let jid: Jid = to
            .as_str()
            .parse()
            .map_err(|e| BotError::Validation(format!("invalid WhatsApp id {}: {:?}", to, e)))?;

        client
            .send_message(jid, handler::outbound(&message))
            .await
            .map_err(|e| BotError::Upstream(format!("send to {} failed: {}", to, e)))?;
        Ok(())
    }

    async fn is_registered(&self, id: &ChatId) -> Result<bool> {
        let client = self.connected_client().await?;
        let phone = id.user();
        let results = client
            .contacts()
            .is_on_whatsapp(&[phone])
            .await
            .map_err(|e| BotError::Upstream(format!("contact lookup for {} failed: {}", id, e)))?;

        // One number per query, so any registered result is this number.
        let registered = results.iter().any(|r| r.is_registered);
        tracing::debug!("WhatsApp: {} registered = {}", id, registered);
        Ok(registered)
    }
}
