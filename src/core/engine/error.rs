//! Error types for the session engine.
//!
//! Two layers of errors exist:
//!
//! - [`DriverError`] covers the upstream bidirectional stream: opening the
//!   stream, reading the response body, and the exception events the remote
//!   service can raise mid-stream.
//! - [`EngineError`] covers session lifecycle operations exposed to callers
//!   (the gateway bridge and tests): unknown sessions, capacity limits,
//!   timeouts, tool failures.

use thiserror::Error;

// =============================================================================
// Driver Errors
// =============================================================================

/// Errors raised by the remote stream driver.
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    /// The bidirectional stream could not be opened.
    #[error("Failed to open upstream stream: {0}")]
    OpenFailed(String),

    /// No inbound event arrived within the handshake window after open.
    #[error("Upstream handshake timed out after {0} seconds")]
    HandshakeTimeout(u64),

    /// The overall stream deadline elapsed.
    #[error("Upstream stream exceeded its {0} second deadline")]
    StreamTimeout(u64),

    /// The model rejected the event sequence (`modelStreamErrorException`).
    #[error("Model stream error: {0}")]
    ModelStream(String),

    /// The remote service failed internally (`internalServerException`).
    #[error("Upstream internal server error: {0}")]
    InternalServer(String),

    /// Transport-level failure while reading the response body.
    #[error("Upstream transport error: {0}")]
    Transport(String),

    /// An inbound frame could not be decoded as a protocol event.
    #[error("Malformed upstream frame: {0}")]
    Codec(String),
}

impl DriverError {
    /// Whether the error indicates the model rejected our event sequence,
    /// as opposed to a transient stream failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, DriverError::ModelStream(_) | DriverError::Codec(_))
    }
}

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

// =============================================================================
// Engine Errors
// =============================================================================

/// Errors surfaced by session lifecycle operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The session ID is unknown or the session is no longer active.
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// An event was enqueued after the session went inactive.
    ///
    /// Callers normally never see this: the queue silently drops late
    /// events. It exists for paths that must report the condition.
    #[error("Outbound queue closed for session {0}")]
    QueueClosed(String),

    /// The opening event sequence could not reach the remote service.
    #[error("Session initiation failed: {0}")]
    InitiationFailed(String),

    /// The configured concurrent stream limit was reached.
    #[error("Concurrent stream limit of {limit} reached")]
    CapacityExceeded { limit: usize },

    /// A tool invocation failed; the session continues.
    #[error("Tool '{tool}' failed: {message}")]
    ToolFailure { tool: String, message: String },

    /// The session exceeded the idle threshold and was force-closed.
    #[error("Session {0} idle timeout")]
    IdleTimeout(String),

    /// Ordered teardown did not complete within its budget.
    #[error("Teardown timed out for session {0}")]
    TeardownTimeout(String),

    /// An upstream stream failure, carried through the lifecycle layer.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
