//! Relay session lifecycle: one downstream WebSocket bridged to one live
//! upstream session.
//!
//! Each accepted connection gets exactly two tasks. The uplink runs on the
//! handler task and forwards client audio upstream; the downlink is spawned
//! and forwards everything the model sends back down, answering tool calls
//! on the way. Both watch one cancellation token, so whichever side ends
//! first drains the other, the upstream session is closed exactly once, and
//! the client socket is closed last. No teardown step waits unboundedly on
//! a peer that has stopped reading.

use crate::{
    instruction,
    state::AppState,
    tools::ToolRegistry,
    ws::protocol::{AUDIO_MIME_TYPE, ClientEvent},
};
use anyhow::{Context, Result};
use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    future::join_all,
    stream::{SplitSink, SplitStream},
};
use gemini_live::{
    LiveConfig, LiveEvent, LiveReceiver, LiveSender, LiveSession, ServerEvent,
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, instrument, warn};
use uuid::Uuid;

type ClientSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;
type LiveSink = Arc<Mutex<LiveSender>>;

/// Upper bound on the close frames written during teardown. A peer that
/// has stopped reading must not keep a finished session pinned.
const TEARDOWN_GRACE: Duration = Duration::from_secs(5);

/// Shared per-session coordination. Both direction tasks watch the token;
/// the flag guarantees the upstream session sees exactly one close no
/// matter which teardown path runs first.
struct SessionContext {
    id: Uuid,
    cancel: CancellationToken,
    upstream_closed: AtomicBool,
}

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Entry point for one client connection: establish the upstream session,
/// then relay until either side ends it.
#[instrument(name = "relay_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", &session_id.to_string());
    info!("New WebSocket connection. Connecting live session...");

    let mut live_config = LiveConfig::new(state.config.api_key.clone());
    live_config.model = state.config.live_model.clone();
    live_config.voice = state.config.voice.clone();
    live_config.endpoint = state.config.live_api_url.clone();
    live_config.system_instruction = instruction::SYSTEM_INSTRUCTION.to_string();
    live_config.tools = state.tools.declarations();
    live_config.explicit_vad_signal = true;

    let live = match LiveSession::connect(live_config).await {
        Ok(live) => live,
        Err(err) => {
            // No relay tasks exist yet; tell the client and stop here.
            error!(error = %err, "Live session connect failed.");
            close_refused(socket).await;
            return;
        }
    };
    info!(model = %state.config.live_model, "Live session established. Relaying.");

    if let Err(err) = run_relay(socket, live, state, session_id).await {
        error!(error = ?err, "Relay session terminated with error.");
    }
    info!("Relay session finished.");
}

/// Closes a never-relayed client socket with an error status.
async fn close_refused(mut socket: WebSocket) {
    let frame = CloseFrame {
        code: close_code::ERROR,
        reason: "upstream connection failed".into(),
    };
    match timeout(TEARDOWN_GRACE, socket.send(Message::Close(Some(frame)))).await {
        Ok(Err(err)) => debug!(error = %err, "Close frame not delivered to client."),
        Err(_) => debug!("Client close timed out."),
        Ok(Ok(())) => {}
    }
}

/// Runs both relay directions and tears them down in order: stop reading
/// from the client, join the downlink, close the upstream session, close
/// the client socket.
async fn run_relay(
    socket: WebSocket,
    live: LiveSession,
    state: Arc<AppState>,
    session_id: Uuid,
) -> Result<()> {
    let ctx = Arc::new(SessionContext {
        id: session_id,
        cancel: CancellationToken::new(),
        upstream_closed: AtomicBool::new(false),
    });
    // If this future is dropped mid-session, the guard still drains the
    // spawned downlink.
    let _drain_on_drop = ctx.cancel.clone().drop_guard();

    let (client_tx, client_rx) = socket.split();
    let client_tx: ClientSink = Arc::new(Mutex::new(client_tx));
    let (live_tx, live_rx) = live.split();
    let live_tx: LiveSink = Arc::new(Mutex::new(live_tx));

    let downlink_span = tracing::info_span!("downlink", session_id = %ctx.id);
    let downlink = tokio::spawn(
        run_downlink(
            live_rx,
            live_tx.clone(),
            client_tx.clone(),
            state.tools.clone(),
            ctx.clone(),
        )
        .instrument(downlink_span),
    );

    let uplink_outcome = run_uplink(client_rx, &live_tx, &ctx).await;

    ctx.cancel.cancel();
    let downlink_outcome = downlink
        .await
        .unwrap_or_else(|err| Err(anyhow::anyhow!("downlink task panicked: {err}")));
    // The downlink closes the upstream session itself on the way out; this
    // covers the paths where it never got to.
    close_upstream(&live_tx, &ctx).await;

    let failed = uplink_outcome.is_err() || downlink_outcome.is_err();
    let close_msg = if failed {
        Message::Close(Some(CloseFrame {
            code: close_code::ERROR,
            reason: "session failed".into(),
        }))
    } else {
        // Clean teardown carries an explicit normal closure status.
        Message::Close(Some(CloseFrame {
            code: close_code::NORMAL,
            reason: "".into(),
        }))
    };
    let close = async { client_tx.lock().await.send(close_msg).await };
    match timeout(TEARDOWN_GRACE, close).await {
        Ok(Err(err)) => debug!(error = %err, "Close frame not delivered to client."),
        Err(_) => debug!("Client close timed out."),
        Ok(Ok(())) => {}
    }

    uplink_outcome.and(downlink_outcome)
}

/// Client -> model direction. Binary frames go upstream in arrival order;
/// a close frame, client error or cancellation ends the loop.
async fn run_uplink(
    mut client_rx: SplitStream<WebSocket>,
    live_tx: &LiveSink,
    ctx: &SessionContext,
) -> Result<()> {
    loop {
        let frame = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                debug!("Uplink stopped by session cancellation.");
                return Ok(());
            }
            frame = client_rx.next() => frame,
        };
        let Some(frame) = frame else {
            info!("Client stream ended.");
            ctx.cancel.cancel();
            return Ok(());
        };
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "Client socket failed.");
                ctx.cancel.cancel();
                return Err(err).context("client socket failed");
            }
        };
        match ClientEvent::from(frame) {
            ClientEvent::Audio(data) => {
                // The send can block on the upstream socket; it yields to
                // cancellation like the read above.
                let sent = tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => {
                        debug!("Uplink stopped by session cancellation.");
                        return Ok(());
                    }
                    sent = async { live_tx.lock().await.send_audio(&data, AUDIO_MIME_TYPE).await } => sent,
                };
                if let Err(err) = sent {
                    if ctx.cancel.is_cancelled() {
                        // The downlink is already tearing the session down.
                        debug!("Audio forward failed during shutdown.");
                        return Ok(());
                    }
                    error!(error = %err, "Audio forward to live session failed.");
                    ctx.cancel.cancel();
                    return Err(err).context("audio forward failed");
                }
            }
            ClientEvent::Close => {
                info!("Client sent close frame. Shutting down session.");
                ctx.cancel.cancel();
                return Ok(());
            }
            ClientEvent::Ignored => debug!("Ignoring non-audio client frame."),
        }
    }
}

/// Model -> client direction, plus tool dispatch. Always closes the
/// upstream session on the way out so a dropped handler task cannot leak
/// the connection.
async fn run_downlink(
    mut live_rx: LiveReceiver,
    live_tx: LiveSink,
    client_tx: ClientSink,
    tools: Arc<ToolRegistry>,
    ctx: Arc<SessionContext>,
) -> Result<()> {
    let outcome = downlink_loop(&mut live_rx, &live_tx, &client_tx, &tools, &ctx).await;
    ctx.cancel.cancel();
    close_upstream(&live_tx, &ctx).await;
    outcome
}

async fn downlink_loop(
    live_rx: &mut LiveReceiver,
    live_tx: &LiveSink,
    client_tx: &ClientSink,
    tools: &ToolRegistry,
    ctx: &SessionContext,
) -> Result<()> {
    loop {
        let received = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                debug!("Downlink stopped by session cancellation.");
                return Ok(());
            }
            received = live_rx.receive() => received,
        };
        let event = match received {
            Ok(Some(event)) => event,
            Ok(None) => {
                info!("Live session ended by server.");
                return Ok(());
            }
            Err(err) => {
                error!(error = %err, "Live session stream failed.");
                return Err(err).context("live stream failed");
            }
        };

        // Dispatch and forwarding can block on a peer or a handler; they
        // yield to cancellation like the receive above.
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                debug!("Downlink stopped by session cancellation.");
                return Ok(());
            }
            outcome = relay_event(event, live_tx, client_tx, tools) => outcome?,
        }
    }
}

/// Handles one upstream event end to end: tool calls are answered first,
/// then the raw payload goes to the client.
async fn relay_event(
    event: LiveEvent,
    live_tx: &LiveSink,
    client_tx: &ClientSink,
    tools: &ToolRegistry,
) -> Result<()> {
    let LiveEvent { kind, raw } = event;
    match kind {
        ServerEvent::ToolCall(calls) => {
            // Answer the model before the payload reaches the client;
            // results for one event go upstream as a single message.
            let results = join_all(calls.iter().map(|call| tools.dispatch(call))).await;
            let sent = live_tx.lock().await.send_tool_results(&results).await;
            if let Err(err) = sent {
                error!(error = %err, "Tool result delivery to live session failed.");
                return Err(err).context("tool result delivery failed");
            }
        }
        ServerEvent::Interrupted => info!("Model turn interrupted."),
        ServerEvent::VoiceActivity => debug!("Voice activity signal from live session."),
        ServerEvent::Audio
        | ServerEvent::Text
        | ServerEvent::SetupComplete
        | ServerEvent::Unknown => {}
    }

    // Every upstream payload reaches the client verbatim, tool calls
    // included; the browser decides what to render.
    let forwarded = client_tx.lock().await.send(Message::Text(raw.into())).await;
    if let Err(err) = forwarded {
        warn!(error = %err, "Forward to client failed.");
        return Err(err).context("client forward failed");
    }
    Ok(())
}

/// Closes the upstream session exactly once, whichever teardown path gets
/// here first.
async fn close_upstream(live_tx: &LiveSink, ctx: &SessionContext) {
    if ctx.upstream_closed.swap(true, Ordering::SeqCst) {
        return;
    }
    let close = async { live_tx.lock().await.close().await };
    if timeout(TEARDOWN_GRACE, close).await.is_err() {
        debug!("Live session close timed out.");
        return;
    }
    debug!("Live session closed.");
}
