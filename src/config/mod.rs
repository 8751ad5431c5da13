//! Configuration module for the voice gateway.
//!
//! Configuration comes from `.env` files and environment variables with
//! sensible defaults; every knob of the session engine is overridable
//! without a config file.
//!
//! # Example
//! ```rust,no_run
//! use sonic_gateway::config::ServerConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::from_env()?;
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use thiserror::Error;

use crate::core::engine::{DEFAULT_SYSTEM_PROMPT, DEFAULT_VOICE_ID, EngineConfig, InferenceConfig};

/// Upstream endpoint region. The speech-to-speech model is only served from
/// a fixed set of regions; this default is the primary one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Upstream speech-to-speech model identifier.
pub const DEFAULT_MODEL_ID: &str = "amazon.nova-sonic-v1:0";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3001;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Server configuration.
///
/// Contains everything needed to run the gateway: the listen address, the
/// upstream endpoint, and the session engine tunables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // Upstream settings
    pub aws_region: String,
    pub model_id: String,
    pub voice_id: String,

    // Session engine tunables
    pub max_concurrent_streams: usize,
    pub request_timeout_secs: u64,
    pub open_timeout_secs: u64,
    pub handshake_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub queue_bound: usize,
    pub teardown_budget_secs: u64,
    pub settle_pause_ms: u64,

    // Inference defaults
    pub max_tokens: u32,
    pub top_p: f32,
    pub temperature: f32,

    /// System prompt used when the client does not supply one.
    pub default_system_prompt: String,

    /// Re-use a live session on `initSession` instead of close-then-recreate.
    pub reuse_session_on_reinit: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_or("HOST", DEFAULT_HOST),
            port: parse_env("PORT", DEFAULT_PORT)?,
            aws_region: env_or("AWS_REGION", DEFAULT_REGION),
            model_id: env_or("MODEL_ID", DEFAULT_MODEL_ID),
            voice_id: env_or("VOICE_ID", DEFAULT_VOICE_ID),
            max_concurrent_streams: parse_env("MAX_CONCURRENT_STREAMS", 20)?,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", 300)?,
            open_timeout_secs: parse_env("STREAM_OPEN_TIMEOUT_SECS", 30)?,
            handshake_timeout_secs: parse_env("HANDSHAKE_TIMEOUT_SECS", 15)?,
            idle_timeout_secs: parse_env("IDLE_TIMEOUT_SECS", 300)?,
            sweep_interval_secs: parse_env("SWEEP_INTERVAL_SECS", 60)?,
            queue_bound: parse_env("AUDIO_QUEUE_BOUND", 200)?,
            teardown_budget_secs: parse_env("TEARDOWN_BUDGET_SECS", 5)?,
            settle_pause_ms: parse_env("SETTLE_PAUSE_MS", 100)?,
            max_tokens: parse_env("INFERENCE_MAX_TOKENS", 1024)?,
            top_p: parse_env("INFERENCE_TOP_P", 0.9)?,
            temperature: parse_env("INFERENCE_TEMPERATURE", 0.7)?,
            default_system_prompt: env_or("DEFAULT_SYSTEM_PROMPT", DEFAULT_SYSTEM_PROMPT),
            reuse_session_on_reinit: parse_env("REUSE_SESSION_ON_REINIT", false)?,
        })
    }

    /// The socket address string the server binds to.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The engine configuration derived from this server configuration.
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            region: self.aws_region.clone(),
            model_id: self.model_id.clone(),
            voice_id: self.voice_id.clone(),
            max_concurrent_streams: self.max_concurrent_streams,
            open_timeout: Duration::from_secs(self.open_timeout_secs),
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            queue_bound: self.queue_bound,
            teardown_budget: Duration::from_secs(self.teardown_budget_secs),
            settle_pause: Duration::from_millis(self.settle_pause_ms),
            inference: InferenceConfig {
                max_tokens: self.max_tokens,
                top_p: self.top_p,
                temperature: self.temperature,
            },
            default_system_prompt: self.default_system_prompt.clone(),
            reuse_session_on_reinit: self.reuse_session_on_reinit,
            ..EngineConfig::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            aws_region: DEFAULT_REGION.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            max_concurrent_streams: 20,
            request_timeout_secs: 300,
            open_timeout_secs: 30,
            handshake_timeout_secs: 15,
            idle_timeout_secs: 300,
            sweep_interval_secs: 60,
            queue_bound: 200,
            teardown_budget_secs: 5,
            settle_pause_ms: 100,
            max_tokens: 1024,
            top_p: 0.9,
            temperature: 0.7,
            default_system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            reuse_session_on_reinit: false,
        }
    }
}

/// Read an environment variable, falling back to a default.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read and parse an environment variable, falling back to a default when
/// unset and failing loudly when set to an unparseable value.
fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value.parse().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
            reason: format!("{e}"),
        }),
        Err(_) => Ok(default),
    }
}
