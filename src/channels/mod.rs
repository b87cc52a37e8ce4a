//! Session Providers
//!
//! Adapters that implement [`Session`] and feed [`SessionEvent`]s into the
//! dispatcher's queue.

pub mod console;
#[cfg(feature = "whatsapp")]
pub mod whatsapp;

pub use console::ConsoleSession;

use crate::config::{Config, SessionProviderKind};
use crate::session::{Session, SessionEvent};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Build the configured provider. Events are pushed onto `events`.
pub fn open_session(
    config: &Config,
    events: mpsc::Sender<SessionEvent>,
) -> anyhow::Result<Arc<dyn Session>> {
    match config.session.provider {
        SessionProviderKind::Console => {
            tracing::info!("Session: using console provider");
            Ok(Arc::new(ConsoleSession::new(events)))
        }
        #[cfg(feature = "whatsapp")]
        SessionProviderKind::WhatsApp => {
            tracing::info!(
                "Session: using WhatsApp provider (store {})",
                config.session.whatsapp_db.display()
            );
            Ok(Arc::new(whatsapp::WhatsAppSession::new(
                config.session.whatsapp_db.clone(),
                config.session.pair_phone.clone(),
                events,
            )))
        }
        #[cfg(not(feature = "whatsapp"))]
        SessionProviderKind::WhatsApp => anyhow::bail!(
            "WhatsApp provider selected but wabot was built without the `whatsapp` feature"
        ),
    }
}
