//! Route configuration for the gateway's HTTP and WebSocket endpoints.

pub mod voice;

pub use voice::create_voice_router;
