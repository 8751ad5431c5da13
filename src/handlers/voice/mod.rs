//! Voice WebSocket handler module.
//!
//! The gateway bridge: maps client socket messages onto session operations
//! and session events onto client messages.

mod handler;
pub mod messages;

pub use handler::voice_handler;
pub use messages::{ChatMessage, VoiceIncomingMessage, VoiceMessageRoute, VoiceOutgoingMessage};
