//! Client for the Gemini Live API: the `v1beta` `BidiGenerateContent`
//! bidirectional WebSocket endpoint.
//!
//! [`LiveSession::connect`] dials the endpoint, sends the `setup` message and
//! waits for `setupComplete`, so a returned session is ready for streaming.
//! The session splits into a [`LiveSender`] (audio chunks, tool results,
//! close) and a [`LiveReceiver`] (classified server events), which lets the
//! two directions run on separate tasks.

pub mod types;

use base64::Engine;
use futures_util::{SinkExt, StreamExt, stream::{SplitSink, SplitStream}};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, protocol::Message as WsMessage},
};
use tracing::{debug, info, warn};

pub use types::{
    FunctionCall, FunctionDeclaration, FunctionResult, ServerEvent, Tool,
};

use types::{
    BidiGenerateContentRealtimeInput, BidiGenerateContentSetup, BidiGenerateContentToolResponse,
    Blob, ClientMessage, Content, GenerationConfig, LiveServerMessage, Part, PrebuiltVoiceConfig,
    ResponseModality, SpeechConfig, VoiceConfig,
};

pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";
pub const DEFAULT_MODEL: &str = "gemini-live-2.5-flash-native-audio";
pub const DEFAULT_VOICE: &str = "Puck";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Errors raised by a live session. Every variant is fatal to the session it
/// came from; none of them is retried here.
#[derive(Debug, Error)]
pub enum LiveError {
    /// Dialing or the setup handshake failed. No session was established.
    #[error("live session connect failed: {0}")]
    Connect(String),
    /// The established stream broke while reading.
    #[error("live session stream failed: {0}")]
    Stream(#[from] tungstenite::Error),
    /// A client message could not be written to the session.
    #[error("live session send failed: {0}")]
    Send(String),
}

/// Connection parameters for one live session.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub api_key: String,
    pub model: String,
    /// Overrides [`DEFAULT_ENDPOINT`], for pointing sessions at a local
    /// stand-in server.
    pub endpoint: Option<String>,
    pub voice: String,
    /// Sent as the `systemInstruction` content when non-empty.
    pub system_instruction: String,
    pub tools: Vec<Tool>,
    /// Asks the server to emit voice activity signals instead of acting on
    /// turn boundaries silently.
    pub explicit_vad_signal: bool,
}

impl LiveConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: None,
            voice: DEFAULT_VOICE.to_string(),
            system_instruction: String::new(),
            tools: Vec::new(),
            explicit_vad_signal: false,
        }
    }

    fn url(&self) -> String {
        let endpoint = self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
        format!("{endpoint}?key={}", self.api_key)
    }

    /// The wire protocol wants the `models/` resource prefix; accept bare
    /// model names and normalize here.
    fn qualified_model(&self) -> String {
        if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        }
    }
}

/// An established, setup-complete live session.
#[derive(Debug)]
pub struct LiveSession {
    stream: WsStream,
}

/// One message off the live stream: the classification a relay routes on,
/// plus the raw JSON text to forward downstream untouched.
#[derive(Debug, Clone)]
pub struct LiveEvent {
    pub kind: ServerEvent,
    pub raw: String,
}

impl LiveSession {
    /// Dials the endpoint, performs the `setup` / `setupComplete` handshake
    /// and returns a streaming-ready session. Any failure on the way is
    /// [`LiveError::Connect`].
    pub async fn connect(config: LiveConfig) -> Result<Self, LiveError> {
        let (mut stream, _) = connect_async(config.url())
            .await
            .map_err(|e| LiveError::Connect(e.to_string()))?;
        debug!(model = %config.model, "connected to live endpoint, sending setup");

        let setup = ClientMessage::Setup(BidiGenerateContentSetup {
            model: config.qualified_model(),
            generation_config: GenerationConfig {
                response_modalities: vec![ResponseModality::Audio],
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: config.voice.clone(),
                        },
                    },
                }),
            },
            system_instruction: if config.system_instruction.is_empty() {
                None
            } else {
                Some(Content {
                    parts: vec![Part {
                        text: config.system_instruction.clone(),
                    }],
                })
            },
            tools: config.tools.clone(),
            explicit_vad_signal: config.explicit_vad_signal.then_some(true),
        });
        let payload =
            serde_json::to_string(&setup).map_err(|e| LiveError::Connect(e.to_string()))?;
        stream
            .send(WsMessage::Text(payload.into()))
            .await
            .map_err(|e| LiveError::Connect(e.to_string()))?;

        // The server acknowledges the setup before any content flows.
        loop {
            let frame = stream
                .next()
                .await
                .ok_or_else(|| LiveError::Connect("stream ended during setup".to_string()))?
                .map_err(|e| LiveError::Connect(e.to_string()))?;
            let Some(text) = frame_text(frame) else {
                continue;
            };
            match serde_json::from_str::<LiveServerMessage>(&text) {
                Ok(msg) if msg.setup_complete.is_some() => {
                    info!("live session setup complete");
                    return Ok(Self { stream });
                }
                Ok(_) => warn!("unexpected message before setup completion"),
                Err(err) => warn!(%err, "undecodable message during setup"),
            }
        }
    }

    pub fn split(self) -> (LiveSender, LiveReceiver) {
        let (tx, rx) = self.stream.split();
        (LiveSender { tx }, LiveReceiver { rx })
    }
}

/// Write half of a live session.
pub struct LiveSender {
    tx: SplitSink<WsStream, WsMessage>,
}

impl LiveSender {
    /// Forwards one audio chunk as a `realtimeInput` message. The bytes go
    /// out base64-encoded with the given MIME type, unmodified otherwise.
    pub async fn send_audio(&mut self, pcm: &[u8], mime_type: &str) -> Result<(), LiveError> {
        let msg = ClientMessage::RealtimeInput(BidiGenerateContentRealtimeInput {
            audio: Blob {
                mime_type: mime_type.to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(pcm),
            },
        });
        self.send(&msg).await
    }

    /// Answers a tool call event. All results for the event travel in one
    /// `toolResponse` message.
    pub async fn send_tool_results(&mut self, results: &[FunctionResult]) -> Result<(), LiveError> {
        let msg = ClientMessage::ToolResponse(BidiGenerateContentToolResponse {
            function_responses: results.to_vec(),
        });
        self.send(&msg).await
    }

    async fn send(&mut self, msg: &ClientMessage) -> Result<(), LiveError> {
        let payload = serde_json::to_string(msg).map_err(|e| LiveError::Send(e.to_string()))?;
        self.tx
            .send(WsMessage::Text(payload.into()))
            .await
            .map_err(|e| LiveError::Send(e.to_string()))
    }

    /// Initiates the closing handshake. Delivery failures are swallowed so
    /// this stays safe to call on an already-broken session.
    pub async fn close(&mut self) {
        if let Err(err) = self.tx.send(WsMessage::Close(None)).await {
            debug!(%err, "close frame not delivered to live session");
        }
    }
}

/// Read half of a live session.
pub struct LiveReceiver {
    rx: SplitStream<WsStream>,
}

impl LiveReceiver {
    /// Waits for the next server message. Returns `Ok(None)` once the server
    /// ends the stream. Frames that fail to decode as JSON are logged and
    /// skipped rather than surfaced. Cancel-safe, so it can sit inside a
    /// `select!` without losing messages.
    pub async fn receive(&mut self) -> Result<Option<LiveEvent>, LiveError> {
        while let Some(frame) = self.rx.next().await {
            let frame = frame?;
            if let WsMessage::Close(frame) = &frame {
                debug!(?frame, "live session closed by server");
                return Ok(None);
            }
            let Some(raw) = frame_text(frame) else {
                continue;
            };
            match serde_json::from_str::<LiveServerMessage>(&raw) {
                Ok(msg) => {
                    return Ok(Some(LiveEvent {
                        kind: msg.classify(),
                        raw,
                    }));
                }
                Err(err) => warn!(%err, "skipping undecodable live frame"),
            }
        }
        Ok(None)
    }
}

/// The server delivers JSON in either text or binary frames. Ping, pong and
/// other control frames carry no payload for us.
fn frame_text(frame: WsMessage) -> Option<String> {
    match frame {
        WsMessage::Text(text) => Some(text.to_string()),
        WsMessage::Binary(data) => match String::from_utf8(data.to_vec()) {
            Ok(text) => Some(text),
            Err(_) => {
                warn!("skipping non-UTF-8 binary frame from live session");
                None
            }
        },
        _ => None,
    }
}
