//! The session engine.
//!
//! This module is the heart of the gateway: it translates the client's
//! simple start/stream/stop control surface into the remote service's
//! strictly ordered event protocol, and translates the service's
//! asynchronous inbound events back into discrete messages for the client.
//!
//! # Architecture
//!
//! - [`events`] - the JSON event codec for the upstream wire protocol.
//! - [`session`] - per-session state: IDs, tracking structures, the bounded
//!   outbound queue, and the two signals everything suspends on.
//! - [`outbound`] - the lazy producer turning the queue into the HTTP/2
//!   request body.
//! - [`driver`] - the per-session bidirectional stream: open, pump, read,
//!   classify, behind the [`driver::UpstreamConnector`] seam.
//! - [`bedrock`] - the production connector over the Bedrock runtime SDK.
//! - [`dispatch`] - inbound event routing and tool-call correlation.
//! - [`manager`] - session lifecycle: create, initiate, ordered teardown,
//!   force-close, and the idle sweeper.
//!
//! # Data Flow
//!
//! ```text
//! client ─▶ bridge ─▶ SessionManager ─▶ queue ─▶ event feed ─▶ upstream
//! client ◀─ bridge ◀─ handlers ◀─ dispatcher ◀─ driver ◀────── upstream
//! ```

pub mod bedrock;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod events;
pub mod manager;
pub mod outbound;
pub mod session;

pub use bedrock::BedrockConnector;
pub use dispatch::EventDispatcher;
pub use driver::{DriverTiming, EndReason, ResponseFrameStream, UpstreamConnector};
pub use error::{DriverError, DriverResult, EngineError, EngineResult};
pub use events::{
    AUDIO_SENTINEL, ContentKind, DEFAULT_VOICE_ID, InboundEvent, InferenceConfig, OutboundEvent,
    Role, ToolSpec, ToolUse, kinds,
};
pub use manager::{DEFAULT_SYSTEM_PROMPT, EngineConfig, SessionManager};
pub use outbound::{RequestFrameStream, event_feed};
pub use session::{EventHandler, Session, SessionState};
