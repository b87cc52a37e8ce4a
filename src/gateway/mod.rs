//! HTTP Gateway
//!
//! `POST /send-meal` pushes today's menu to a WhatsApp number or group.

use crate::bot::TodayFn;
use crate::config::GatewayConfig;
use crate::error::BotError;
use crate::menu::{self, MENU_MISSING, MenuStore};
use crate::session::{ChatId, OutboundMessage, Session};
use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::timeout;

const NUMBER_REQUIRED: &str = "Nomor atau grup WA wajib diisi.";
const NOT_REGISTERED: &str = "Nomor tidak terdaftar di WhatsApp.";
const SENT: &str = "Pesan menu berhasil dikirim.";
const SEND_FAILED: &str = "Gagal mengirim pesan.";

/// Shared handles for request handlers.
pub struct GatewayState {
    pub session: Arc<dyn Session>,
    pub menu: Arc<dyn MenuStore>,
    pub today: TodayFn,
    /// Upper bound for each registration lookup and send.
    pub send_timeout: Duration,
}

#[derive(Debug, Deserialize)]
pub struct SendMealRequest {
    #[serde(default)]
    pub number: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SendMealResponse {
    pub status: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hari: Option<usize>,
    #[serde(rename = "dikirimKe", skip_serializing_if = "Option::is_none")]
    pub dikirim_ke: Option<String>,
}

impl SendMealResponse {
    fn failure(message: &str) -> Self {
        Self {
            status: false,
            message: message.to_string(),
            hari: None,
            dikirim_ke: None,
        }
    }
}

type Reply = (StatusCode, Json<SendMealResponse>);

fn fail(code: StatusCode, message: &str) -> Reply {
    (code, Json(SendMealResponse::failure(message)))
}

pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/send-meal", post(send_meal))
        .with_state(state)
}

async fn send_meal(
    State(state): State<Arc<GatewayState>>,
    body: Result<Json<SendMealRequest>, JsonRejection>,
) -> Reply {
    let number = match body {
        Ok(Json(request)) => request.number.unwrap_or_default(),
        Err(rejection) => {
            tracing::warn!("Gateway: rejected body: {}", rejection);
            return fail(StatusCode::BAD_REQUEST, NUMBER_REQUIRED);
        }
    };
    let number = number.trim();
    if number.is_empty() {
        return fail(StatusCode::BAD_REQUEST, NUMBER_REQUIRED);
    }

    let target = ChatId::from_number(number);
    if !target.is_group() {
        match timeout(state.send_timeout, state.session.is_registered(&target)).await {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => return fail(StatusCode::UNPROCESSABLE_ENTITY, NOT_REGISTERED),
            Ok(Err(e)) => {
                tracing::error!("Gateway: registration lookup for {} failed: {}", target, e);
                return fail(StatusCode::INTERNAL_SERVER_ERROR, SEND_FAILED);
            }
            Err(_) => {
                tracing::error!("Gateway: registration lookup for {} timed out", target);
                return fail(StatusCode::INTERNAL_SERVER_ERROR, SEND_FAILED);
            }
        }
    }

    let record = match state.menu.get_all().await {
        Ok(record) => record,
        Err(BotError::NotFound(_)) => return fail(StatusCode::NOT_FOUND, MENU_MISSING),
        Err(e) => {
            tracing::error!("Gateway: menu read failed: {}", e);
            return fail(StatusCode::INTERNAL_SERVER_ERROR, SEND_FAILED);
        }
    };

    let today = (state.today)();
    let text = menu::render_menu("Ini", record.day(today));
    let sent = timeout(
        state.send_timeout,
        state.session.send(&target, OutboundMessage::text(text)),
    )
    .await;
    match sent {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::error!("Gateway: send to {} failed: {}", target, e);
            return fail(StatusCode::INTERNAL_SERVER_ERROR, SEND_FAILED);
        }
        Err(_) => {
            tracing::error!("Gateway: send to {} timed out", target);
            return fail(StatusCode::INTERNAL_SERVER_ERROR, SEND_FAILED);
        }
    }

    tracing::info!("Gateway: sent menu for day {} to {}", today, target);
    (
        StatusCode::OK,
        Json(SendMealResponse {
            status: true,
            message: SENT.to_string(),
            hari: Some(today),
            dikirim_ke: Some(target.to_string()),
        }),
    )
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve(
    config: &GatewayConfig,
    state: Arc<GatewayState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind gateway to {}", addr))?;
    tracing::info!("Gateway: listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Gateway server failed")?;

    tracing::info!("Gateway: stopped");
    Ok(())
}
