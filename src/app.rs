//! Application wiring: builds the session, store, completion service,
//! dispatcher and optional gateway from [`Config`], then runs until a
//! fatal session error, end of input, or Ctrl+C.

use crate::bot::{DispatchSettings, Dispatcher};
use crate::channels;
use crate::completion::{CompletionService, OpenAiCompletion};
use crate::config::Config;
use crate::gateway::{self, GatewayState};
use crate::menu::{self, FileMenuStore, MenuStore};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Optional completion service; a missing API key disables `!ask`.
pub fn completion_from_config(config: &Config) -> Option<Arc<dyn CompletionService>> {
    match OpenAiCompletion::from_config(&config.openai) {
        Ok(service) => {
            tracing::info!("Completion: using model {}", service.model());
            Some(Arc::new(service))
        }
        Err(e) => {
            tracing::warn!("Completion: disabled ({})", e);
            None
        }
    }
}

pub async fn run_bot(config: Config) -> Result<()> {
    let (events_tx, events_rx) = mpsc::channel(config.session.event_buffer);
    let session = channels::open_session(&config, events_tx)?;
    let menu_store: Arc<dyn MenuStore> = Arc::new(FileMenuStore::new(config.menu.path.clone()));
    tracing::info!("Menu: using {}", config.menu.path.display());

    let mut dispatcher = Dispatcher::new(
        Arc::clone(&session),
        Arc::clone(&menu_store),
        DispatchSettings::from_config(&config),
        config.reconnect.retry_config(),
    );
    if let Some(completion) = completion_from_config(&config) {
        dispatcher = dispatcher.with_completion(completion);
    }
    if !config.dispatch.reply_enabled {
        tracing::warn!("Replies are disabled (DO_REPLY=false); messages are only logged");
    }

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let gateway_task = if config.gateway.enabled {
        let state = Arc::new(GatewayState {
            session: Arc::clone(&session),
            menu: Arc::clone(&menu_store),
            today: Arc::new(menu::today_index),
            send_timeout: Duration::from_secs(config.dispatch.send_timeout_secs),
        });
        let gateway_config = config.gateway.clone();
        Some(tokio::spawn(async move {
            let shutdown = async move {
                let _ = stop_rx.changed().await;
            };
            gateway::serve(&gateway_config, state, shutdown).await
        }))
    } else {
        None
    };

    dispatcher.start_session();
    let outcome = tokio::select! {
        result = dispatcher.run(events_rx) => result.map_err(anyhow::Error::from),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    };

    stop_tx.send_replace(true);
    if let Some(task) = gateway_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Gateway error: {:#}", e),
            Err(e) => tracing::error!("Gateway task failed: {}", e),
        }
    }

    outcome
}
