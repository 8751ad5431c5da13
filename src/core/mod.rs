//! Core gateway functionality: the session engine and the built-in tools.

pub mod engine;
pub mod tools;

// Re-export commonly used types for convenience
pub use engine::{
    BedrockConnector, DriverError, EngineConfig, EngineError, EngineResult, EventDispatcher,
    InboundEvent, InferenceConfig, OutboundEvent, Session, SessionManager, UpstreamConnector,
};
pub use tools::{ToolError, ToolRegistry};
