//! Voice WebSocket route configuration.

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::voice::voice_handler;
use crate::state::AppState;

/// Create the voice WebSocket router.
///
/// # Endpoint
///
/// `GET /voice` - WebSocket upgrade for full-duplex voice conversation.
///
/// # Protocol
///
/// After the upgrade, clients send:
/// 1. `initSession` with an optional custom system prompt
/// 2. Microphone audio as binary frames (PCM 16-bit, 16 kHz, mono) or as
///    base64 `audioInput` messages
/// 3. `stopAudio` to end the conversation in order
///
/// The gateway responds with `sessionInitialized`, then forwards session
/// events (`contentStart`, `textOutput`, `audioOutput`, `toolUse`,
/// `toolResult`, `contentEnd`, `streamComplete`, `error`) as named JSON
/// messages. Synthesized audio arrives base64-encoded at 24 kHz.
pub fn create_voice_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/voice", get(voice_handler))
        .layer(TraceLayer::new_for_http())
}
