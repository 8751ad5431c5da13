//! Event codec for the upstream speech-to-speech protocol.
//!
//! Every frame on the bidirectional stream is a JSON object with a single
//! top-level `event` key whose value holds exactly one entry, keyed by the
//! event kind:
//!
//! ```json
//! { "event": { "audioInput": { "promptName": "...", "contentName": "...", "content": "<base64>" } } }
//! ```
//!
//! Binary PCM audio is base64-encoded into `content` strings; there is no
//! binary framing. Outbound events are strongly typed ([`OutboundEvent`]) and
//! encoded immediately before they are yielded into the request body. Inbound
//! frames decode into [`InboundEvent`], which keeps the kind as a plain
//! string so unknown kinds pass through to handlers unchanged.

use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::error::DriverError;

// =============================================================================
// Protocol Constants
// =============================================================================

/// Media type for text content blocks.
pub const TEXT_MEDIA_TYPE: &str = "text/plain";

/// Media type for linear PCM audio.
pub const AUDIO_MEDIA_TYPE: &str = "audio/lpcm";

/// Media type for tool-use output payloads.
pub const JSON_MEDIA_TYPE: &str = "application/json";

/// Microphone input sample rate (PCM16 mono).
pub const INPUT_SAMPLE_RATE_HZ: u32 = 16_000;

/// Synthesized output sample rate (PCM16 mono).
pub const OUTPUT_SAMPLE_RATE_HZ: u32 = 24_000;

/// Bits per sample for both directions.
pub const SAMPLE_SIZE_BITS: u32 = 16;

/// Channel count for both directions.
pub const CHANNEL_COUNT: u32 = 1;

/// Default voice for synthesized output.
pub const DEFAULT_VOICE_ID: &str = "tiffany";

/// Zero-filled audio chunk sent before an audio content block is closed.
///
/// The remote service rejects audio content blocks that carry no data. This
/// sentinel is contractual with the service and must be preserved unless the
/// service contract changes.
pub const AUDIO_SENTINEL: [u8; 4] = [0u8; 4];

/// Event kind names used on the wire and as handler keys.
pub mod kinds {
    pub const SESSION_START: &str = "sessionStart";
    pub const PROMPT_START: &str = "promptStart";
    pub const CONTENT_START: &str = "contentStart";
    pub const TEXT_INPUT: &str = "textInput";
    pub const AUDIO_INPUT: &str = "audioInput";
    pub const TOOL_RESULT: &str = "toolResult";
    pub const CONTENT_END: &str = "contentEnd";
    pub const PROMPT_END: &str = "promptEnd";
    pub const SESSION_END: &str = "sessionEnd";

    pub const TEXT_OUTPUT: &str = "textOutput";
    pub const AUDIO_OUTPUT: &str = "audioOutput";
    pub const TOOL_USE: &str = "toolUse";

    /// Synthetic event dispatched when the response body ends cleanly.
    pub const STREAM_COMPLETE: &str = "streamComplete";
    /// Synthetic event dispatched when a stream or tool failure surfaces.
    pub const ERROR: &str = "error";
    /// Handler key invoked for every inbound event after the kind handler.
    pub const ANY: &str = "any";

    pub const MODEL_STREAM_ERROR: &str = "modelStreamErrorException";
    pub const INTERNAL_SERVER_ERROR: &str = "internalServerException";
}

// =============================================================================
// Configuration Payloads
// =============================================================================

/// Inference parameters carried on `sessionStart`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfig {
    /// Maximum tokens per model turn.
    pub max_tokens: u32,
    /// Nucleus sampling parameter.
    pub top_p: f32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            top_p: 0.9,
            temperature: 0.7,
        }
    }
}

/// Tool definition advertised on `promptStart`.
///
/// The input schema is carried as a JSON value here and stringified at
/// encode time; the wire format nests it as a JSON-encoded string under
/// `inputSchema.json`.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Content block type on `contentStart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    Audio,
    Tool,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "TEXT",
            ContentKind::Audio => "AUDIO",
            ContentKind::Tool => "TOOL",
        }
    }
}

/// Role attached to a content block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "SYSTEM",
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
            Role::Tool => "TOOL",
        }
    }
}

// =============================================================================
// Outbound Events
// =============================================================================

/// An event queued for delivery to the remote service.
///
/// Every event names the prompt (and, for content events, the content block)
/// it belongs to; the identifiers come from the session's tracking
/// structures, never from ad-hoc strings.
#[derive(Debug, Clone)]
pub enum OutboundEvent {
    SessionStart {
        inference: InferenceConfig,
    },
    PromptStart {
        prompt_name: String,
        voice_id: String,
        tools: Vec<ToolSpec>,
    },
    ContentStart {
        prompt_name: String,
        content_name: String,
        kind: ContentKind,
        role: Role,
        interactive: bool,
        /// Set only for TOOL content blocks carrying a tool result.
        tool_use_id: Option<String>,
    },
    TextInput {
        prompt_name: String,
        content_name: String,
        content: String,
    },
    AudioInput {
        prompt_name: String,
        content_name: String,
        /// Base64-encoded PCM16 audio.
        content: String,
    },
    ToolResult {
        prompt_name: String,
        content_name: String,
        /// Stringified JSON result.
        content: String,
    },
    ContentEnd {
        prompt_name: String,
        content_name: String,
    },
    PromptEnd {
        prompt_name: String,
    },
    SessionEnd,
}

impl OutboundEvent {
    /// Build an `audioInput` event from raw PCM bytes.
    pub fn audio_input(prompt_name: &str, content_name: &str, pcm: &[u8]) -> Self {
        OutboundEvent::AudioInput {
            prompt_name: prompt_name.to_string(),
            content_name: content_name.to_string(),
            content: BASE64_STANDARD.encode(pcm),
        }
    }

    /// The 4-byte zero sentinel as an `audioInput` event.
    pub fn audio_sentinel(prompt_name: &str, content_name: &str) -> Self {
        Self::audio_input(prompt_name, content_name, &AUDIO_SENTINEL)
    }

    /// Wire kind of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundEvent::SessionStart { .. } => kinds::SESSION_START,
            OutboundEvent::PromptStart { .. } => kinds::PROMPT_START,
            OutboundEvent::ContentStart { .. } => kinds::CONTENT_START,
            OutboundEvent::TextInput { .. } => kinds::TEXT_INPUT,
            OutboundEvent::AudioInput { .. } => kinds::AUDIO_INPUT,
            OutboundEvent::ToolResult { .. } => kinds::TOOL_RESULT,
            OutboundEvent::ContentEnd { .. } => kinds::CONTENT_END,
            OutboundEvent::PromptEnd { .. } => kinds::PROMPT_END,
            OutboundEvent::SessionEnd => kinds::SESSION_END,
        }
    }

    /// Whether this event is subject to the audio drop-oldest policy.
    pub fn is_audio(&self) -> bool {
        matches!(self, OutboundEvent::AudioInput { .. })
    }

    /// Encode as the framed JSON value `{"event": {"<kind>": {...}}}`.
    pub fn encode(&self) -> Value {
        let payload = match self {
            OutboundEvent::SessionStart { inference } => json!({
                "inferenceConfiguration": inference,
            }),
            OutboundEvent::PromptStart {
                prompt_name,
                voice_id,
                tools,
            } => json!({
                "promptName": prompt_name,
                "textOutputConfiguration": { "mediaType": TEXT_MEDIA_TYPE },
                "audioOutputConfiguration": {
                    "mediaType": AUDIO_MEDIA_TYPE,
                    "sampleRateHertz": OUTPUT_SAMPLE_RATE_HZ,
                    "sampleSizeBits": SAMPLE_SIZE_BITS,
                    "channelCount": CHANNEL_COUNT,
                    "voiceId": voice_id,
                    "encoding": "base64",
                    "audioType": "SPEECH",
                },
                "toolUseOutputConfiguration": { "mediaType": JSON_MEDIA_TYPE },
                "toolConfiguration": {
                    "tools": tools
                        .iter()
                        .map(|t| json!({
                            "toolSpec": {
                                "name": t.name,
                                "description": t.description,
                                "inputSchema": { "json": t.input_schema.to_string() },
                            }
                        }))
                        .collect::<Vec<_>>(),
                },
            }),
            OutboundEvent::ContentStart {
                prompt_name,
                content_name,
                kind,
                role,
                interactive,
                tool_use_id,
            } => {
                let (config_key, config_value) = match kind {
                    ContentKind::Text => (
                        "textInputConfiguration",
                        json!({ "mediaType": TEXT_MEDIA_TYPE }),
                    ),
                    ContentKind::Audio => (
                        "audioInputConfiguration",
                        json!({
                            "mediaType": AUDIO_MEDIA_TYPE,
                            "sampleRateHertz": INPUT_SAMPLE_RATE_HZ,
                            "sampleSizeBits": SAMPLE_SIZE_BITS,
                            "channelCount": CHANNEL_COUNT,
                            "audioType": "SPEECH",
                            "encoding": "base64",
                        }),
                    ),
                    ContentKind::Tool => (
                        "toolResultInputConfiguration",
                        json!({
                            "toolUseId": tool_use_id.clone().unwrap_or_default(),
                            "type": "TEXT",
                            "textInputConfiguration": { "mediaType": TEXT_MEDIA_TYPE },
                        }),
                    ),
                };
                let mut payload = serde_json::Map::new();
                payload.insert("promptName".to_string(), json!(prompt_name));
                payload.insert("contentName".to_string(), json!(content_name));
                payload.insert("type".to_string(), json!(kind.as_str()));
                payload.insert("interactive".to_string(), json!(interactive));
                payload.insert("role".to_string(), json!(role.as_str()));
                payload.insert(config_key.to_string(), config_value);
                Value::Object(payload)
            }
            OutboundEvent::TextInput {
                prompt_name,
                content_name,
                content,
            } => json!({
                "promptName": prompt_name,
                "contentName": content_name,
                "content": content,
            }),
            OutboundEvent::AudioInput {
                prompt_name,
                content_name,
                content,
            } => json!({
                "promptName": prompt_name,
                "contentName": content_name,
                "content": content,
            }),
            OutboundEvent::ToolResult {
                prompt_name,
                content_name,
                content,
            } => json!({
                "promptName": prompt_name,
                "contentName": content_name,
                "content": content,
            }),
            OutboundEvent::ContentEnd {
                prompt_name,
                content_name,
            } => json!({
                "promptName": prompt_name,
                "contentName": content_name,
            }),
            OutboundEvent::PromptEnd { prompt_name } => json!({
                "promptName": prompt_name,
            }),
            OutboundEvent::SessionEnd => json!({}),
        };

        let mut inner = serde_json::Map::new();
        inner.insert(self.kind().to_string(), payload);
        json!({ "event": inner })
    }

    /// Encode as a serialized frame ready for the request body.
    pub fn encode_frame(&self) -> Bytes {
        Bytes::from(self.encode().to_string())
    }
}

// =============================================================================
// Inbound Events
// =============================================================================

/// Tool invocation request decoded from a `toolUse` event.
#[derive(Debug, Clone)]
pub struct ToolUse {
    pub tool_use_id: String,
    pub tool_name: String,
    /// JSON-encoded tool arguments.
    pub content: String,
}

/// A decoded inbound event.
///
/// The kind is kept as a plain string so that kinds this gateway does not
/// know about are still routed to handlers under their literal name.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub kind: String,
    pub payload: Value,
}

impl InboundEvent {
    /// Decode a framed JSON chunk into an event.
    pub fn decode(frame: &[u8]) -> Result<Self, DriverError> {
        let value: Value = serde_json::from_slice(frame)
            .map_err(|e| DriverError::Codec(format!("invalid JSON frame: {e}")))?;
        let event = value
            .get("event")
            .and_then(Value::as_object)
            .ok_or_else(|| DriverError::Codec("frame has no 'event' object".to_string()))?;
        let (kind, payload) = event
            .iter()
            .next()
            .ok_or_else(|| DriverError::Codec("'event' object is empty".to_string()))?;
        Ok(InboundEvent {
            kind: kind.clone(),
            payload: payload.clone(),
        })
    }

    /// Build a synthetic event dispatched by the gateway itself
    /// (`streamComplete`, `error`).
    pub fn synthetic(kind: &str, payload: Value) -> Self {
        InboundEvent {
            kind: kind.to_string(),
            payload,
        }
    }

    /// Build the synthetic `error` event surfaced to handlers.
    pub fn error(message: &str, details: Option<&str>) -> Self {
        let mut payload = json!({ "message": message });
        if let Some(details) = details {
            payload["details"] = Value::String(details.to_string());
        }
        Self::synthetic(kinds::ERROR, payload)
    }

    /// Interpret this event as a tool invocation request.
    pub fn tool_use(&self) -> Option<ToolUse> {
        if self.kind != kinds::TOOL_USE {
            return None;
        }
        Some(ToolUse {
            tool_use_id: self.payload.get("toolUseId")?.as_str()?.to_string(),
            tool_name: self.payload.get("toolName")?.as_str()?.to_string(),
            content: self
                .payload
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or("{}")
                .to_string(),
        })
    }

    /// The content block sub-type (`TEXT` or `TOOL`) on a `contentEnd`.
    pub fn content_type(&self) -> Option<&str> {
        self.payload.get("type").and_then(Value::as_str)
    }

    /// The `stopReason` field, when present.
    pub fn stop_reason(&self) -> Option<&str> {
        self.payload.get("stopReason").and_then(Value::as_str)
    }

    /// The `role` field, when present.
    pub fn role(&self) -> Option<&str> {
        self.payload.get("role").and_then(Value::as_str)
    }
}

// =============================================================================
// Tests
// =============================================================================
