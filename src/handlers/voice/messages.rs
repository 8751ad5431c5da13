//! Voice WebSocket message types.
//!
//! This module defines the client-facing protocol of the gateway. Clients
//! send named JSON messages (and raw binary frames for microphone audio);
//! the gateway answers with named JSON messages, forwarding session events
//! verbatim under their event kind.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Maximum allowed size for a custom system prompt (100 KB).
pub const MAX_PROMPT_SIZE: usize = 100 * 1024;

/// Maximum allowed size for a base64 audio payload (1 MB).
pub const MAX_AUDIO_PAYLOAD_SIZE: usize = 1024 * 1024;

// =============================================================================
// Incoming Messages (Client -> Gateway)
// =============================================================================

/// Incoming WebSocket messages from the client.
///
/// Microphone audio may arrive either as binary frames or as base64 inside
/// an `audioInput` JSON message; both feed the same path.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum VoiceIncomingMessage {
    /// Start (or restart) a conversation session.
    #[serde(rename = "initSession")]
    InitSession {
        /// Custom system prompt; the configured default is used when absent.
        #[serde(default)]
        prompt: Option<String>,
    },

    /// One chunk of microphone audio, base64-encoded PCM16.
    #[serde(rename = "audioInput")]
    AudioInput { audio: String },

    /// Stop streaming and tear the session down in order.
    #[serde(rename = "stopAudio")]
    StopAudio,

    /// Request the transcript history accumulated on this connection.
    #[serde(rename = "getHistory")]
    GetHistory,
}

impl VoiceIncomingMessage {
    /// Validate field sizes to bound per-message memory.
    pub fn validate_size(&self) -> Result<(), String> {
        match self {
            VoiceIncomingMessage::InitSession {
                prompt: Some(prompt),
            } if prompt.len() > MAX_PROMPT_SIZE => Err(format!(
                "Prompt too large: {} bytes (max: {} bytes)",
                prompt.len(),
                MAX_PROMPT_SIZE
            )),
            VoiceIncomingMessage::AudioInput { audio } if audio.len() > MAX_AUDIO_PAYLOAD_SIZE => {
                Err(format!(
                    "Audio payload too large: {} bytes (max: {} bytes)",
                    audio.len(),
                    MAX_AUDIO_PAYLOAD_SIZE
                ))
            }
            _ => Ok(()),
        }
    }
}

// =============================================================================
// Outgoing Messages (Gateway -> Client)
// =============================================================================

/// One entry of the per-connection transcript history.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Outgoing WebSocket messages to the client.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum VoiceOutgoingMessage {
    /// Acknowledgement of `initSession`.
    #[serde(rename = "sessionInitialized")]
    SessionInitialized {
        success: bool,
        #[serde(rename = "sessionId")]
        session_id: String,
    },

    /// The transcript history accumulated on this connection.
    #[serde(rename = "chatHistory")]
    ChatHistory { messages: Vec<ChatMessage> },

    /// Error surfaced to the client.
    #[serde(rename = "error")]
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
}

// =============================================================================
// Message Routing
// =============================================================================

/// Routing for the socket sender task.
pub enum VoiceMessageRoute {
    /// Fixed gateway message.
    Outgoing(VoiceOutgoingMessage),
    /// Session event forwarded verbatim under its kind.
    Event { kind: String, data: Value },
    /// Close the connection.
    Close,
}

impl VoiceMessageRoute {
    /// Serialize this route's payload into a text frame, if it carries one.
    pub fn to_frame(&self) -> Option<String> {
        match self {
            VoiceMessageRoute::Outgoing(message) => serde_json::to_string(message).ok(),
            VoiceMessageRoute::Event { kind, data } => {
                Some(json!({ "type": kind, "data": data }).to_string())
            }
            VoiceMessageRoute::Close => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_session_deserialization() {
        let json = r#"{"type": "initSession", "prompt": "Describe this drum."}"#;
        let msg: VoiceIncomingMessage = serde_json::from_str(json).expect("Should deserialize");
        match msg {
            VoiceIncomingMessage::InitSession { prompt } => {
                assert_eq!(prompt.as_deref(), Some("Describe this drum."));
            }
            _ => panic!("Expected InitSession variant"),
        }
    }

    #[test]
    fn test_init_session_without_prompt() {
        let json = r#"{"type": "initSession"}"#;
        let msg: VoiceIncomingMessage = serde_json::from_str(json).expect("Should deserialize");
        match msg {
            VoiceIncomingMessage::InitSession { prompt } => assert!(prompt.is_none()),
            _ => panic!("Expected InitSession variant"),
        }
    }

    #[test]
    fn test_audio_input_deserialization() {
        let json = r#"{"type": "audioInput", "audio": "AAAA"}"#;
        let msg: VoiceIncomingMessage = serde_json::from_str(json).expect("Should deserialize");
        match msg {
            VoiceIncomingMessage::AudioInput { audio } => assert_eq!(audio, "AAAA"),
            _ => panic!("Expected AudioInput variant"),
        }
    }

    #[test]
    fn test_stop_audio_deserialization() {
        let json = r#"{"type": "stopAudio"}"#;
        let msg: VoiceIncomingMessage = serde_json::from_str(json).expect("Should deserialize");
        assert!(matches!(msg, VoiceIncomingMessage::StopAudio));
    }

    #[test]
    fn test_session_initialized_serialization() {
        let msg = VoiceOutgoingMessage::SessionInitialized {
            success: true,
            session_id: "sess_123".to_string(),
        };
        let json = serde_json::to_string(&msg).expect("Should serialize");
        assert!(json.contains(r#""type":"sessionInitialized""#));
        assert!(json.contains(r#""sessionId":"sess_123""#));
        assert!(json.contains(r#""success":true"#));
    }

    #[test]
    fn test_error_serialization_omits_empty_details() {
        let msg = VoiceOutgoingMessage::Error {
            message: "boom".to_string(),
            details: None,
        };
        let json = serde_json::to_string(&msg).expect("Should serialize");
        assert!(json.contains(r#""type":"error""#));
        assert!(!json.contains("details"));
    }

    #[test]
    fn test_event_route_frame_shape() {
        let route = VoiceMessageRoute::Event {
            kind: "textOutput".to_string(),
            data: json!({"content": "A ceremonial drum"}),
        };
        let frame = route.to_frame().unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "textOutput");
        assert_eq!(value["data"]["content"], "A ceremonial drum");
    }

    #[test]
    fn test_close_route_has_no_frame() {
        assert!(VoiceMessageRoute::Close.to_frame().is_none());
    }

    #[test]
    fn test_prompt_size_validation() {
        let msg = VoiceIncomingMessage::InitSession {
            prompt: Some("a".repeat(MAX_PROMPT_SIZE + 1)),
        };
        assert!(msg.validate_size().is_err());

        let msg = VoiceIncomingMessage::InitSession {
            prompt: Some("a".repeat(16)),
        };
        assert!(msg.validate_size().is_ok());
    }

    #[test]
    fn test_audio_size_validation() {
        let msg = VoiceIncomingMessage::AudioInput {
            audio: "a".repeat(MAX_AUDIO_PAYLOAD_SIZE + 1),
        };
        assert!(msg.validate_size().is_err());
    }
}
