//! Voice WebSocket handler.
//!
//! One connection maps 1:1 onto one session: the socket identifier is the
//! session ID. Client messages become session operations, session events
//! become named client messages, and a disconnect tears the session down
//! within a bounded deadline.
//!
//! At most one session is in flight per client: `initSession` on an
//! already-initiated session tears the old one down to completion before a
//! fresh session is created, re-registered, and initiated.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use base64::prelude::*;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::engine::{Session, SessionManager, kinds};
use crate::state::AppState;

use super::messages::{ChatMessage, VoiceIncomingMessage, VoiceMessageRoute, VoiceOutgoingMessage};

/// Channel buffer size for outgoing messages; sized for audio workloads.
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (2 MB).
const MAX_WS_FRAME_SIZE: usize = 2 * 1024 * 1024;

/// Maximum WebSocket message size (2 MB).
const MAX_WS_MESSAGE_SIZE: usize = 2 * 1024 * 1024;

/// Deadline for ordered teardown after a disconnect.
const DISCONNECT_DEADLINE: Duration = Duration::from_secs(5);

/// Session event kinds forwarded verbatim to the client.
const FORWARDED_KINDS: [&str; 7] = [
    kinds::CONTENT_START,
    kinds::TEXT_OUTPUT,
    kinds::AUDIO_OUTPUT,
    kinds::TOOL_USE,
    kinds::TOOL_RESULT,
    kinds::CONTENT_END,
    kinds::STREAM_COMPLETE,
];

/// Per-connection transcript history.
///
/// Lives and dies with the socket; it is not shared across clients.
type ChatHistory = Arc<Mutex<Vec<ChatMessage>>>;

/// Voice WebSocket handler.
///
/// Upgrades the HTTP connection to a WebSocket for full-duplex voice
/// conversation: PCM16 microphone audio up, synthesized audio and
/// transcripts down.
pub async fn voice_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("Voice WebSocket connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_voice_socket(socket, state))
}

/// Handle one voice WebSocket connection.
async fn handle_voice_socket(socket: WebSocket, app_state: Arc<AppState>) {
    let client_id = Uuid::new_v4().to_string();
    info!(%client_id, "Voice WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<VoiceMessageRoute>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing messages.
    let sender_task = tokio::spawn(async move {
        while let Some(route) = message_rx.recv().await {
            let result = match route.to_frame() {
                Some(frame) => sender.send(Message::Text(frame.into())).await,
                None => {
                    info!("Closing voice WebSocket connection");
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };
            if let Err(e) = result {
                error!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    let manager = app_state.manager.clone();
    let history: ChatHistory = Arc::new(Mutex::new(Vec::new()));

    // The session is created at connect time; audio is only accepted once
    // the client has initiated it.
    let mut session = manager.create_session(&client_id);
    register_forward_handlers(&session, &message_tx, &history);

    while let Some(msg_result) = receiver.next().await {
        match msg_result {
            Ok(msg) => {
                let continue_processing = process_voice_message(
                    msg,
                    &mut session,
                    &manager,
                    &message_tx,
                    &history,
                )
                .await;
                if !continue_processing {
                    break;
                }
            }
            Err(e) => {
                warn!(%client_id, "Voice WebSocket error: {}", e);
                break;
            }
        }
    }

    // Disconnect path: ordered teardown under a deadline, force-close on
    // expiry. The session record must be gone either way.
    if manager.is_registered(session.id()) {
        match tokio::time::timeout(DISCONNECT_DEADLINE, manager.close_session(session.id())).await
        {
            Ok(_) => {}
            Err(_) => {
                warn!(%client_id, "Teardown deadline expired, force-closing");
                manager.force_close(session.id()).await;
            }
        }
    }

    sender_task.abort();
    info!(%client_id, "Voice WebSocket connection terminated");
}

/// Process one incoming WebSocket message.
///
/// Returns `false` when the connection should close.
async fn process_voice_message(
    msg: Message,
    session: &mut Arc<Session>,
    manager: &SessionManager,
    message_tx: &mpsc::Sender<VoiceMessageRoute>,
    history: &ChatHistory,
) -> bool {
    match msg {
        Message::Text(text) => {
            let incoming: VoiceIncomingMessage = match serde_json::from_str(&text) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("Failed to parse voice message: {}", e);
                    send_error(message_tx, &format!("Invalid message format: {e}"), None).await;
                    return true;
                }
            };

            if let Err(e) = incoming.validate_size() {
                warn!("Message validation failed: {}", e);
                send_error(message_tx, &e, None).await;
                return true;
            }

            handle_voice_incoming(incoming, session, manager, message_tx, history).await
        }
        Message::Binary(data) => {
            push_audio(session, &data);
            true
        }
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            info!("Voice WebSocket close received");
            false
        }
    }
}

/// Handle typed incoming messages.
async fn handle_voice_incoming(
    msg: VoiceIncomingMessage,
    session: &mut Arc<Session>,
    manager: &SessionManager,
    message_tx: &mpsc::Sender<VoiceMessageRoute>,
    history: &ChatHistory,
) -> bool {
    match msg {
        VoiceIncomingMessage::InitSession { prompt } => {
            handle_init_session(prompt, session, manager, message_tx, history).await;
            true
        }
        VoiceIncomingMessage::AudioInput { audio } => {
            match BASE64_STANDARD.decode(audio.as_bytes()) {
                Ok(pcm) => push_audio(session, &pcm),
                Err(e) => {
                    send_error(message_tx, &format!("Invalid base64 audio: {e}"), None).await;
                }
            }
            true
        }
        VoiceIncomingMessage::StopAudio => {
            if let Err(e) = manager.close_session(session.id()).await {
                debug!(session_id = %session.id(), "stopAudio on closed session: {e}");
            }
            true
        }
        VoiceIncomingMessage::GetHistory => {
            let messages = history.lock().clone();
            let _ = message_tx
                .send(VoiceMessageRoute::Outgoing(
                    VoiceOutgoingMessage::ChatHistory { messages },
                ))
                .await;
            true
        }
    }
}

/// Handle `initSession`: close-then-recreate over an initiated session,
/// then seed and start the fresh one, then acknowledge.
async fn handle_init_session(
    prompt: Option<String>,
    session: &mut Arc<Session>,
    manager: &SessionManager,
    message_tx: &mpsc::Sender<VoiceMessageRoute>,
    history: &ChatHistory,
) {
    let already_initiated = session.is_active() && session.state().prompt_start_sent;
    if already_initiated {
        if manager.config().reuse_session_on_reinit {
            debug!(session_id = %session.id(), "Re-init on live session, re-using it");
            let _ = message_tx
                .send(VoiceMessageRoute::Outgoing(
                    VoiceOutgoingMessage::SessionInitialized {
                        success: true,
                        session_id: session.id().to_string(),
                    },
                ))
                .await;
            return;
        }

        // Tear the live session down to completion before replacing it, so
        // the upstream sees the full ordered close for the old stream.
        info!(session_id = %session.id(), "Re-init on live session, closing it first");
        if let Err(e) = manager.close_session(session.id()).await {
            warn!(session_id = %session.id(), "Failed to close previous session: {e}");
        }
        *session = manager.create_session(session.id());
        register_forward_handlers(session, message_tx, history);
        history.lock().clear();
    }

    match manager.initiate_session(session.id(), prompt).await {
        Ok(()) => {
            let _ = message_tx
                .send(VoiceMessageRoute::Outgoing(
                    VoiceOutgoingMessage::SessionInitialized {
                        success: true,
                        session_id: session.id().to_string(),
                    },
                ))
                .await;
        }
        Err(e) => {
            error!(session_id = %session.id(), "Session initiation failed: {e}");
            send_error(message_tx, "Failed to initialize session", Some(&e.to_string())).await;
            let _ = message_tx
                .send(VoiceMessageRoute::Outgoing(
                    VoiceOutgoingMessage::SessionInitialized {
                        success: false,
                        session_id: session.id().to_string(),
                    },
                ))
                .await;
        }
    }
}

/// Feed one PCM chunk into the session, dropping it when the audio content
/// block is not open yet.
fn push_audio(session: &Arc<Session>, pcm: &[u8]) {
    if session.is_audio_ready() {
        session.stream_audio(pcm);
    } else {
        debug!(session_id = %session.id(), "Session not accepting audio, dropping chunk");
    }
}

/// Register the default inbound handlers that forward session events to the
/// socket as named messages and feed the transcript history.
fn register_forward_handlers(
    session: &Arc<Session>,
    message_tx: &mpsc::Sender<VoiceMessageRoute>,
    history: &ChatHistory,
) {
    for kind in FORWARDED_KINDS {
        let tx = message_tx.clone();
        session.register_handler(
            kind,
            Arc::new(move |event| {
                let tx = tx.clone();
                Box::pin(async move {
                    let _ = tx
                        .send(VoiceMessageRoute::Event {
                            kind: event.kind,
                            data: event.payload,
                        })
                        .await;
                    Ok(())
                })
            }),
        );
    }

    // Transcripts additionally land in the per-connection history.
    let tx = message_tx.clone();
    let transcript_sink = history.clone();
    session.register_handler(
        kinds::TEXT_OUTPUT,
        Arc::new(move |event| {
            let tx = tx.clone();
            let transcript_sink = transcript_sink.clone();
            Box::pin(async move {
                if let Some(content) = event.payload.get("content").and_then(|v| v.as_str()) {
                    transcript_sink.lock().push(ChatMessage {
                        role: event.role().unwrap_or("ASSISTANT").to_string(),
                        content: content.to_string(),
                    });
                }
                let _ = tx
                    .send(VoiceMessageRoute::Event {
                        kind: event.kind,
                        data: event.payload,
                    })
                    .await;
                Ok(())
            })
        }),
    );

    // Errors keep the client-facing `{message, details?}` shape.
    let tx = message_tx.clone();
    session.register_handler(
        kinds::ERROR,
        Arc::new(move |event| {
            let tx = tx.clone();
            Box::pin(async move {
                let message = event
                    .payload
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Session error")
                    .to_string();
                let details = event
                    .payload
                    .get("details")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                let _ = tx
                    .send(VoiceMessageRoute::Outgoing(VoiceOutgoingMessage::Error {
                        message,
                        details,
                    }))
                    .await;
                Ok(())
            })
        }),
    );
}

/// Send a named error message to the client.
async fn send_error(
    message_tx: &mpsc::Sender<VoiceMessageRoute>,
    message: &str,
    details: Option<&str>,
) {
    let _ = message_tx
        .send(VoiceMessageRoute::Outgoing(VoiceOutgoingMessage::Error {
            message: message.to_string(),
            details: details.map(str::to_string),
        }))
        .await;
}
