//! WhatsApp event translation: protobuf messages and connection events into
//! [`SessionEvent`]s, plus terminal QR rendering for pairing.

use crate::session::{
    ChatId, CloseReason, ConnectionUpdate, InboundMessage, OutboundMessage, SessionEvent,
};
use qrcode::QrCode;
use wacore::types::events::Event;
use wacore::types::message::MessageInfo;
use waproto::whatsapp::message::ExtendedTextMessage;
use waproto::whatsapp::{ContextInfo, Message};

/// Unwrap nested message wrappers (device_sent, ephemeral, view_once, etc.)
/// and return the innermost message.
fn unwrap_message(msg: &Message) -> &Message {
    if let Some(ref dsm) = msg.device_sent_message
        && let Some(ref inner) = dsm.message
    {
        return unwrap_message(inner);
    }
    if let Some(ref eph) = msg.ephemeral_message
        && let Some(ref inner) = eph.message
    {
        return unwrap_message(inner);
    }
    if let Some(ref vo) = msg.view_once_message
        && let Some(ref inner) = vo.message
    {
        return unwrap_message(inner);
    }
    msg
}

/// Plain text of a message: the conversation field, extended text, or an
/// image or video caption.
pub fn extract_text(msg: &Message) -> Option<String> {
    let msg = unwrap_message(msg);
    if let Some(ref conv) = msg.conversation
        && !conv.is_empty()
    {
        return Some(conv.clone());
    }
    if let Some(ref ext) = msg.extended_text_message
        && let Some(ref text) = ext.text
    {
        return Some(text.clone());
    }
    if let Some(ref img) = msg.image_message
        && let Some(ref caption) = img.caption
        && !caption.is_empty()
    {
        return Some(caption.clone());
    }
    if let Some(ref video) = msg.video_message
        && let Some(ref caption) = video.caption
        && !caption.is_empty()
    {
        return Some(caption.clone());
    }
    None
}

/// Normalise a JID string: drop the `:device` suffix from the user part.
/// `628123:12@s.whatsapp.net` becomes `628123@s.whatsapp.net`.
pub fn chat_id(jid: &str) -> ChatId {
    match jid.split_once('@') {
        Some((user, server)) => {
            let user = user.split(':').next().unwrap_or(user);
            ChatId::new(format!("{}@{}", user, server))
        }
        None => ChatId::new(jid),
    }
}

pub fn inbound(msg: &Message, info: &MessageInfo) -> InboundMessage {
    InboundMessage {
        sender_id: chat_id(&info.source.sender.to_string()),
        conversation_id: chat_id(&info.source.chat.to_string()),
        is_group: info.source.is_group,
        text: extract_text(msg),
        timestamp: info.timestamp,
        from_me: info.source.is_from_me,
    }
}

/// Plain text goes out as a conversation message. Mentions need extended
/// text so the mentioned JIDs travel in the context info; the caller still
/// writes `@user` into the text itself.
pub fn outbound(message: &OutboundMessage) -> Message {
    if message.mentions.is_empty() {
        return Message {
            conversation: Some(message.text.clone()),
            ..Default::default()
        };
    }

    let context = ContextInfo {
        mentioned_jid: message.mentions.iter().map(|m| m.to_string()).collect(),
        ..Default::default()
    };
    Message {
        extended_text_message: Some(
            ExtendedTextMessage {
                text: Some(message.text.clone()),
                context_info: Some(context.into()),
                ..Default::default()
            }
            .into(),
        ),
        ..Default::default()
    }
}

/// Map a client event onto the session event queue. Returns `None` for
/// events the bot does not act on.
pub fn translate(event: &Event) -> Option<SessionEvent> {
    match event {
        Event::Connected(_) => {
            tracing::info!("WhatsApp: connected");
            Some(SessionEvent::Connection(ConnectionUpdate::Open))
        }
        Event::LoggedOut(_) => {
            tracing::warn!("WhatsApp: logged out");
            Some(SessionEvent::Connection(ConnectionUpdate::Closed(
                CloseReason::LoggedOut,
            )))
        }
        Event::Disconnected(_) => {
            tracing::warn!("WhatsApp: disconnected");
            Some(SessionEvent::Connection(ConnectionUpdate::Closed(
                CloseReason::Transient("disconnected".to_string()),
            )))
        }
        Event::Message(msg, info) => Some(SessionEvent::Message(inbound(msg, info))),
        Event::PairingQrCode { code, .. } => {
            match render_qr_unicode(code) {
                Some(qr) => println!("\nScan with WhatsApp > Linked Devices:\n{}", qr),
                None => tracing::warn!("WhatsApp: could not render QR code: {}", code),
            }
            None
        }
        Event::PairingCode { code, timeout } => {
            println!(
                "\nWhatsApp pairing code: {}\nEnter it in WhatsApp > Linked Devices > Link with phone number (expires in {:?})\n",
                code, timeout
            );
            None
        }
        Event::PairSuccess(_) => {
            tracing::info!("WhatsApp: pairing successful");
            None
        }
        other => {
            tracing::debug!("WhatsApp: unhandled event: {:?}", other);
            None
        }
    }
}

/// Render a QR code as Unicode half blocks, two rows per line, with the
/// 4-module quiet zone scanners need.
pub fn render_qr_unicode(data: &str) -> Option<String> {
    let code = QrCode::new(data.as_bytes()).ok()?;
    let matrix = code.to_colors();
    let w = code.width();
    let quiet = 4;
    let total = w + quiet * 2;
    let mut out = String::new();

    let dark_at = |x: usize, y: usize| -> bool {
        if x < quiet || x >= quiet + w || y < quiet || y >= quiet + w {
            false
        } else {
            matrix[(y - quiet) * w + (x - quiet)] == qrcode::Color::Dark
        }
    };

    for y in (0..total).step_by(2) {
        for x in 0..total {
            let ch = match (dark_at(x, y), y + 1 < total && dark_at(x, y + 1)) {
                (false, false) => ' ',
                (true, true) => '\u{2588}',
                (true, false) => '\u{2580}',
                (false, true) => '\u{2584}',
            };
            out.push(ch);
        }
        out.push('\n');
    }
    Some(out)
}
