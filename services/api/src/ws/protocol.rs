//! Defines what downstream WebSocket frames mean to a relay session.
//!
//! The browser protocol is deliberately thin: microphone audio arrives as
//! raw binary frames, and everything the model says goes back as the
//! upstream JSON text, forwarded verbatim. There is no envelope to parse on
//! the way in.

use axum::extract::ws::Message;
use bytes::Bytes;

/// MIME type for downstream microphone audio: raw PCM16 little-endian mono
/// at 16 kHz, exactly as captured by the browser.
pub const AUDIO_MIME_TYPE: &str = "audio/pcm;rate=16000";

/// A downstream frame, reduced to what the relay acts on.
#[derive(Debug, PartialEq)]
pub enum ClientEvent {
    /// Raw PCM bytes to forward upstream unchanged.
    Audio(Bytes),
    /// The client finished the conversation.
    Close,
    /// Frames the relay does not act on. Text is tolerated for forward
    /// compatibility; ping and pong are answered at the transport layer.
    Ignored,
}

impl From<Message> for ClientEvent {
    fn from(msg: Message) -> Self {
        match msg {
            Message::Binary(data) => ClientEvent::Audio(data),
            Message::Close(_) => ClientEvent::Close,
            Message::Text(_) | Message::Ping(_) | Message::Pong(_) => ClientEvent::Ignored,
        }
    }
}
