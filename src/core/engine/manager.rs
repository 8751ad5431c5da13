//! Session lifecycle management.
//!
//! The [`SessionManager`] owns the process-wide session registry, creates
//! and initiates sessions, runs the ordered teardown contract, and sweeps
//! idle sessions. It is the only component that starts driver tasks.
//!
//! # Teardown Contract
//!
//! Teardown order is a hard contract with the upstream service:
//!
//! 1. Ensure at least one audio chunk (possibly the 4-byte sentinel) has
//!    been sent for each open audio content block.
//! 2. `contentEnd` for every tracked open content block.
//! 3. `promptEnd` for every tracked open prompt.
//! 4. `sessionEnd`, then deactivate, fire the close signal, and remove the
//!    record from the registry.
//!
//! Skipping step 1 or 2 produces a "no content data received" rejection,
//! skipping step 3 leaves phantom prompts, skipping step 4 leaks stream
//! quota upstream. When ordered teardown cannot finish inside its budget the
//! session is force-closed instead.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, sleep};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::dispatch::{self, EventDispatcher};
use super::driver::{self, DriverTiming, EndReason, UpstreamConnector};
use super::error::{DriverError, EngineError, EngineResult};
use super::events::{
    AUDIO_SENTINEL, ContentKind, DEFAULT_VOICE_ID, InboundEvent, InferenceConfig, OutboundEvent,
    Role, kinds,
};
use super::session::Session;
use crate::core::tools::ToolRegistry;

/// System prompt used when the client does not supply one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly assistant. The user and you will \
    engage in a spoken dialog exchanging the transcripts of a natural real-time conversation. \
    Keep your responses short, generally two or three sentences for chatty scenarios.";

/// Poll interval while waiting for the outbound queue to drain at teardown.
const DRAIN_POLL: Duration = Duration::from_millis(25);

// =============================================================================
// Engine Configuration
// =============================================================================

/// Tunable parameters of the session engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upstream endpoint region. Fixed per deployment.
    pub region: String,
    /// Upstream model identifier.
    pub model_id: String,
    /// Voice for synthesized output.
    pub voice_id: String,
    /// Maximum sessions with an open upstream stream.
    pub max_concurrent_streams: usize,
    /// Deadline for opening the bidirectional stream.
    pub open_timeout: Duration,
    /// Deadline for the first inbound chunk after open.
    pub handshake_timeout: Duration,
    /// Overall deadline for one upstream stream.
    pub request_timeout: Duration,
    /// Empty-queue wait bound for the request-body feed.
    pub feed_empty_wait: Duration,
    /// Idle threshold before the sweeper force-closes a session.
    pub idle_timeout: Duration,
    /// Period of the idle sweeper.
    pub sweep_interval: Duration,
    /// Audio bound of the outbound queue.
    pub queue_bound: usize,
    /// Budget for ordered teardown before falling back to force-close.
    pub teardown_budget: Duration,
    /// Settling pause between ordered initiation/teardown steps.
    pub settle_pause: Duration,
    /// How long teardown waits for the queue to drain after `sessionEnd`.
    pub drain_wait: Duration,
    /// Default inference parameters for new sessions.
    pub inference: InferenceConfig,
    /// System prompt used when the client does not supply one.
    pub default_system_prompt: String,
    /// When `true`, `initSession` on an already-initiated session re-uses it
    /// instead of tearing it down and recreating it.
    pub reuse_session_on_reinit: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            model_id: "amazon.nova-sonic-v1:0".to_string(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            max_concurrent_streams: 20,
            open_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(300),
            feed_empty_wait: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
            queue_bound: 200,
            teardown_budget: Duration::from_secs(5),
            settle_pause: Duration::from_millis(100),
            drain_wait: Duration::from_secs(2),
            inference: InferenceConfig::default(),
            default_system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            reuse_session_on_reinit: false,
        }
    }
}

// =============================================================================
// Session Manager
// =============================================================================

/// Process-wide session registry and lifecycle coordinator.
///
/// Thread-safe and cheap to clone; all state is shared behind `Arc`s.
#[derive(Clone)]
pub struct SessionManager {
    config: Arc<EngineConfig>,
    connector: Arc<dyn UpstreamConnector>,
    dispatcher: Arc<EventDispatcher>,
    tools: ToolRegistry,
    /// Session records by ID.
    sessions: Arc<DashMap<String, Arc<Session>>>,
    /// Sessions currently undergoing cleanup.
    cleanup: Arc<DashMap<String, ()>>,
}

impl SessionManager {
    pub fn new(config: EngineConfig, connector: Arc<dyn UpstreamConnector>) -> Self {
        Self::with_tools(config, connector, ToolRegistry::new())
    }

    pub fn with_tools(
        config: EngineConfig,
        connector: Arc<dyn UpstreamConnector>,
        tools: ToolRegistry,
    ) -> Self {
        Self {
            config: Arc::new(config),
            connector,
            dispatcher: Arc::new(EventDispatcher::new(tools.clone())),
            tools,
            sessions: Arc::new(DashMap::new()),
            cleanup: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Registry
    // -------------------------------------------------------------------------

    /// Create and register a session record.
    ///
    /// If a record already exists under this ID it is marked inactive and
    /// replaced; in-flight consumers of the old record observe the inactive
    /// flag and terminate cleanly.
    pub fn create_session(&self, id: &str) -> Arc<Session> {
        let session = Arc::new(Session::new(
            id,
            self.config.inference,
            self.config.queue_bound,
        ));
        if let Some(old) = self.sessions.insert(id.to_string(), session.clone()) {
            warn!(session_id = id, "Replacing existing session record");
            old.deactivate();
            old.close_token().cancel();
        }
        info!(session_id = id, "Session created");
        session
    }

    /// Look up an active session.
    pub fn get_session(&self, id: &str) -> EngineResult<Arc<Session>> {
        let session = self
            .sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| EngineError::InvalidSession(id.to_string()))?;
        if !session.is_active() {
            return Err(EngineError::InvalidSession(id.to_string()));
        }
        Ok(session)
    }

    /// Whether this exact record is still the registered one for its ID.
    fn is_current(&self, session: &Arc<Session>) -> bool {
        self.sessions
            .get(session.id())
            .map(|entry| Arc::ptr_eq(entry.value(), session))
            .unwrap_or(false)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Sessions currently holding an open upstream stream.
    fn streaming_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.value().is_active() && entry.value().driver_started())
            .count()
    }

    // -------------------------------------------------------------------------
    // Initiation
    // -------------------------------------------------------------------------

    /// Seed the opening event sequence and start the stream driver.
    ///
    /// The sequence is emitted with a settling pause between steps so the
    /// upstream can accept each one in order: `sessionStart`, `promptStart`,
    /// the system-prompt triplet, the audio `contentStart`, and the 4-byte
    /// zero sentinel chunk.
    pub async fn initiate_session(
        &self,
        id: &str,
        custom_prompt: Option<String>,
    ) -> EngineResult<()> {
        let session = self.get_session(id)?;
        if session.state().prompt_start_sent {
            return Err(EngineError::InitiationFailed(format!(
                "session {id} is already initiated"
            )));
        }

        let streaming = self.streaming_count();
        if streaming >= self.config.max_concurrent_streams {
            warn!(
                session_id = id,
                streaming, "Concurrent stream limit reached, rejecting initiation"
            );
            return Err(EngineError::CapacityExceeded {
                limit: self.config.max_concurrent_streams,
            });
        }

        if let Some(prompt) = custom_prompt {
            session.state().custom_system_prompt = Some(prompt);
        }

        let settle = self.config.settle_pause;
        let prompt_name = session.prompt_name().to_string();

        // Step 1: session start.
        session.enqueue(OutboundEvent::SessionStart {
            inference: session.inference(),
        });
        sleep(settle).await;

        // Step 2: prompt start, tracked before the event is queued.
        {
            let mut state = session.state();
            state.active_prompts.insert(prompt_name.clone());
            state.prompt_start_sent = true;
            session.enqueue(OutboundEvent::PromptStart {
                prompt_name: prompt_name.clone(),
                voice_id: self.config.voice_id.clone(),
                tools: self.tools.specs(),
            });
        }
        sleep(settle).await;

        // Step 3: system prompt triplet under a fresh tracked content ID.
        let system_prompt = session
            .state()
            .custom_system_prompt
            .take()
            .unwrap_or_else(|| self.config.default_system_prompt.clone());
        let text_content_id = Uuid::new_v4().to_string();
        {
            let mut state = session.state();
            state
                .active_contents
                .insert(text_content_id.clone(), prompt_name.clone());
            session.enqueue(OutboundEvent::ContentStart {
                prompt_name: prompt_name.clone(),
                content_name: text_content_id.clone(),
                kind: ContentKind::Text,
                role: Role::System,
                interactive: true,
                tool_use_id: None,
            });
            session.enqueue(OutboundEvent::TextInput {
                prompt_name: prompt_name.clone(),
                content_name: text_content_id.clone(),
                content: system_prompt,
            });
            session.enqueue(OutboundEvent::ContentEnd {
                prompt_name: prompt_name.clone(),
                content_name: text_content_id.clone(),
            });
            state.active_contents.remove(&text_content_id);
        }
        sleep(settle).await;

        // Step 4: open the audio content block.
        let audio_content_id = session.audio_content_id().to_string();
        {
            let mut state = session.state();
            state
                .active_contents
                .insert(audio_content_id.clone(), prompt_name.clone());
            state.audio_content_start_sent = true;
            session.enqueue(OutboundEvent::ContentStart {
                prompt_name: prompt_name.clone(),
                content_name: audio_content_id.clone(),
                kind: ContentKind::Audio,
                role: Role::User,
                interactive: true,
                tool_use_id: None,
            });
        }

        // Step 5: sentinel chunk, so the block is never closed empty.
        session.stream_audio(&AUDIO_SENTINEL);

        self.spawn_driver(session);
        Ok(())
    }

    fn driver_timing(&self) -> DriverTiming {
        DriverTiming {
            open_timeout: self.config.open_timeout,
            handshake_timeout: self.config.handshake_timeout,
            request_timeout: self.config.request_timeout,
            feed_empty_wait: self.config.feed_empty_wait,
        }
    }

    /// Run the stream driver for a session on its own task, then settle the
    /// session's fate based on how the stream ended.
    fn spawn_driver(&self, session: Arc<Session>) {
        let manager = self.clone();
        tokio::spawn(async move {
            let result = driver::run_stream(
                session.clone(),
                manager.connector.clone(),
                manager.dispatcher.clone(),
                manager.driver_timing(),
            )
            .await;

            match result {
                Ok(EndReason::Complete) => {
                    debug!(session_id = %session.id(), "Stream completed");
                    if manager.is_current(&session) && session.is_active() {
                        let _ = manager.close_session(session.id()).await;
                    }
                }
                Ok(EndReason::Cancelled) | Ok(EndReason::Inactive) => {
                    debug!(session_id = %session.id(), "Stream stopped by session shutdown");
                }
                Err(e) => {
                    warn!(session_id = %session.id(), "Stream failed: {e}");
                    let event = InboundEvent::error(&stream_error_message(&e), Some(&e.to_string()));
                    dispatch::emit_event(&session, event).await;
                    if manager.is_current(&session) && session.is_active() {
                        let _ = manager.close_session(session.id()).await;
                    }
                }
            }

            // Exactly one terminal event per session; when an error fired
            // above, streamComplete follows it.
            if session.try_mark_terminal() {
                dispatch::emit_event(
                    &session,
                    InboundEvent::synthetic(kinds::STREAM_COMPLETE, json!({})),
                )
                .await;
            }
        });
    }

    // -------------------------------------------------------------------------
    // Audio
    // -------------------------------------------------------------------------

    /// Enqueue a raw PCM16 chunk for an active session.
    pub fn stream_audio(&self, id: &str, pcm: &[u8]) -> EngineResult<()> {
        let session = self.get_session(id)?;
        session.stream_audio(pcm);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Teardown
    // -------------------------------------------------------------------------

    /// Tear a session down in order, within the configured budget.
    ///
    /// Safe to call repeatedly; a session already undergoing cleanup is left
    /// to the in-flight call. Unknown IDs are rejected.
    pub async fn close_session(&self, id: &str) -> EngineResult<()> {
        if self.cleanup.insert(id.to_string(), ()).is_some() {
            debug!(session_id = id, "Cleanup already in progress");
            return Ok(());
        }

        let result = async {
            let Some(session) = self.sessions.get(id).map(|entry| entry.value().clone()) else {
                return Err(EngineError::InvalidSession(id.to_string()));
            };

            if !session.driver_started() || !session.is_active() {
                // Nothing ever reached the upstream, or the session is
                // already dying: there is no ordered contract to honor.
                self.destroy(&session);
                return Ok(());
            }

            match tokio::time::timeout(
                self.config.teardown_budget,
                self.ordered_teardown(&session),
            )
            .await
            {
                Ok(()) => {
                    info!(session_id = id, "Session closed");
                    Ok(())
                }
                Err(_) => {
                    warn!(
                        session_id = id,
                        "Ordered teardown exceeded its budget, force-closing"
                    );
                    self.destroy(&session);
                    Err(EngineError::TeardownTimeout(id.to_string()))
                }
            }
        }
        .await;

        // Residual state goes unconditionally, even when a step failed.
        self.sessions.remove(id);
        self.cleanup.remove(id);
        result
    }

    /// The ordered teardown steps. Every step is attempted even if an
    /// earlier one had nothing to do.
    async fn ordered_teardown(&self, session: &Arc<Session>) {
        let settle = self.config.settle_pause;
        let prompt_name = session.prompt_name().to_string();
        let audio_content_id = session.audio_content_id().to_string();

        // Step 1: the upstream rejects audio blocks closed with no data.
        {
            let mut state = session.state();
            if state.audio_content_start_sent && !state.audio_data_sent {
                state.audio_data_sent = true;
                session.enqueue(OutboundEvent::audio_sentinel(
                    &prompt_name,
                    &audio_content_id,
                ));
            }
        }
        sleep(settle).await;

        // Step 2: close every open content block, removing each entry.
        let contents: Vec<(String, String)> = {
            let mut state = session.state();
            state.active_contents.drain().collect()
        };
        for (content_name, owning_prompt) in contents {
            session.enqueue(OutboundEvent::ContentEnd {
                prompt_name: owning_prompt,
                content_name,
            });
        }
        sleep(settle).await;

        // Step 3: close every open prompt.
        let prompts: Vec<String> = {
            let mut state = session.state();
            state.active_prompts.drain().collect()
        };
        for prompt in prompts {
            session.enqueue(OutboundEvent::PromptEnd {
                prompt_name: prompt,
            });
        }
        sleep(settle).await;

        // Step 4: end the session and let the queue drain to the upstream
        // before the feed is cut.
        session.enqueue(OutboundEvent::SessionEnd);
        let drain_deadline = Instant::now() + self.config.drain_wait;
        while !session.is_queue_empty() && Instant::now() < drain_deadline {
            sleep(DRAIN_POLL).await;
        }

        self.destroy(session);
    }

    /// Force-close a session, bypassing the ordered steps.
    ///
    /// Idempotent; a no-op when the session is unknown or already being
    /// cleaned up.
    pub async fn force_close(&self, id: &str) {
        if self.cleanup.insert(id.to_string(), ()).is_some() {
            return;
        }
        if let Some((_, session)) = self.sessions.remove(id) {
            info!(session_id = id, "Force-closing session");
            self.destroy(&session);
        }
        self.cleanup.remove(id);
    }

    /// Cancellation for every task attached to the session.
    fn destroy(&self, session: &Arc<Session>) {
        session.deactivate();
        session.close_token().cancel();
    }

    // -------------------------------------------------------------------------
    // Idle Sweeper
    // -------------------------------------------------------------------------

    /// Spawn the periodic task that force-closes idle sessions.
    pub fn spawn_idle_sweeper(&self) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.config.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let idle: Vec<Arc<Session>> = manager
                    .sessions
                    .iter()
                    .filter(|entry| {
                        entry.value().is_active()
                            && entry.value().idle_for() > manager.config.idle_timeout
                    })
                    .map(|entry| entry.value().clone())
                    .collect();

                for session in idle {
                    warn!(
                        session_id = %session.id(),
                        idle_for = ?session.idle_for(),
                        "Force-closing idle session"
                    );
                    let event = InboundEvent::error(
                        "Session closed due to inactivity",
                        Some(&format!(
                            "no activity for {} seconds",
                            manager.config.idle_timeout.as_secs()
                        )),
                    );
                    dispatch::emit_event(&session, event).await;
                    manager.force_close(session.id()).await;
                }
            }
        })
    }
}

/// Client-facing message for a stream failure.
fn stream_error_message(error: &DriverError) -> String {
    if error.is_validation() {
        "The conversation service rejected the session".to_string()
    } else {
        "The conversation stream failed".to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::StreamExt;
    use parking_lot::Mutex;

    use crate::core::engine::driver::{RequestFrameStream, ResponseFrameStream};

    /// Connector that consumes the request body and never responds.
    struct SilentConnector {
        sent: Arc<Mutex<Vec<serde_json::Value>>>,
    }

    impl SilentConnector {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Arc::new(Mutex::new(Vec::new())),
            })
        }
    }

    #[async_trait]
    impl UpstreamConnector for SilentConnector {
        async fn open(
            &self,
            _session_id: &str,
            mut request: RequestFrameStream,
        ) -> crate::core::engine::error::DriverResult<ResponseFrameStream> {
            let sent = self.sent.clone();
            tokio::spawn(async move {
                while let Some(frame) = request.next().await {
                    if let Ok(value) = serde_json::from_slice(&frame) {
                        sent.lock().push(value);
                    }
                }
            });
            Ok(Box::pin(futures::stream::pending::<
                crate::core::engine::error::DriverResult<Bytes>,
            >()))
        }
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            settle_pause: Duration::from_millis(5),
            drain_wait: Duration::from_millis(300),
            teardown_budget: Duration::from_secs(2),
            handshake_timeout: Duration::from_secs(30),
            feed_empty_wait: Duration::from_millis(100),
            ..EngineConfig::default()
        }
    }

    fn manager() -> SessionManager {
        SessionManager::new(fast_config(), SilentConnector::new())
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let m = manager();
        let session = m.create_session("c1");
        assert!(session.is_active());
        assert_eq!(m.session_count(), 1);

        let looked_up = m.get_session("c1").unwrap();
        assert!(Arc::ptr_eq(&session, &looked_up));
    }

    #[tokio::test]
    async fn test_get_unknown_session_is_invalid() {
        let m = manager();
        assert!(matches!(
            m.get_session("nope"),
            Err(EngineError::InvalidSession(_))
        ));
    }

    #[tokio::test]
    async fn test_create_session_replaces_and_deactivates_old() {
        let m = manager();
        let first = m.create_session("c1");
        let second = m.create_session("c1");

        assert!(!first.is_active());
        assert!(first.close_token().is_cancelled());
        assert!(second.is_active());
        assert_eq!(m.session_count(), 1);
        assert!(Arc::ptr_eq(&m.get_session("c1").unwrap(), &second));
    }

    #[tokio::test]
    async fn test_close_unknown_session_is_rejected() {
        let m = manager();
        assert!(matches!(
            m.close_session("ghost").await,
            Err(EngineError::InvalidSession(_))
        ));
    }

    #[tokio::test]
    async fn test_close_uninitiated_session_skips_ordered_teardown() {
        let m = manager();
        let session = m.create_session("c1");
        m.close_session("c1").await.unwrap();

        assert!(!session.is_active());
        assert!(session.close_token().is_cancelled());
        assert!(!m.is_registered("c1"));
    }

    #[tokio::test]
    async fn test_force_close_is_idempotent() {
        let m = manager();
        let session = m.create_session("c1");

        m.force_close("c1").await;
        assert!(!session.is_active());
        assert!(!m.is_registered("c1"));

        // Second call observes the same end state, no panic, no change.
        m.force_close("c1").await;
        assert!(!m.is_registered("c1"));

        // Unknown ID is a no-op.
        m.force_close("never-existed").await;
    }

    #[tokio::test]
    async fn test_stream_audio_requires_active_session() {
        let m = manager();
        assert!(matches!(
            m.stream_audio("ghost", &[0u8; 4]),
            Err(EngineError::InvalidSession(_))
        ));

        m.create_session("c1");
        m.stream_audio("c1", &[0u8; 4]).unwrap();

        m.force_close("c1").await;
        assert!(matches!(
            m.stream_audio("c1", &[0u8; 4]),
            Err(EngineError::InvalidSession(_))
        ));
    }

    #[tokio::test]
    async fn test_capacity_limit_rejects_initiation() {
        let mut config = fast_config();
        config.max_concurrent_streams = 1;
        let m = SessionManager::new(config, SilentConnector::new());

        m.create_session("c1");
        m.initiate_session("c1", None).await.unwrap();

        // Wait for the first driver to mark itself started.
        let session = m.get_session("c1").unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while !session.driver_started() && Instant::now() < deadline {
            sleep(Duration::from_millis(10)).await;
        }
        assert!(session.driver_started());

        m.create_session("c2");
        let err = m.initiate_session("c2", None).await.unwrap_err();
        assert!(matches!(err, EngineError::CapacityExceeded { limit: 1 }));
    }

    #[tokio::test]
    async fn test_initiation_seeds_opening_sequence() {
        let connector = SilentConnector::new();
        let m = SessionManager::with_tools(fast_config(), connector.clone(), ToolRegistry::new());

        m.create_session("c1");
        m.initiate_session("c1", Some("Describe this drum.".to_string()))
            .await
            .unwrap();

        // The driver consumes the queue; wait for the full opening sequence
        // to land at the connector.
        let deadline = Instant::now() + Duration::from_secs(2);
        while connector.sent.lock().len() < 7 && Instant::now() < deadline {
            sleep(Duration::from_millis(10)).await;
        }

        let kinds: Vec<String> = connector
            .sent
            .lock()
            .iter()
            .map(|v| {
                v["event"]
                    .as_object()
                    .unwrap()
                    .keys()
                    .next()
                    .unwrap()
                    .clone()
            })
            .collect();
        assert_eq!(
            kinds,
            [
                "sessionStart",
                "promptStart",
                "contentStart",
                "textInput",
                "contentEnd",
                "contentStart",
                "audioInput",
            ]
        );

        // The custom prompt is carried on the textInput.
        let text_input = &connector.sent.lock()[3];
        assert_eq!(
            text_input["event"]["textInput"]["content"],
            "Describe this drum."
        );

        // The tracked state holds exactly the open prompt and audio block.
        let session = m.get_session("c1").unwrap();
        let state = session.state();
        assert_eq!(state.active_prompts.len(), 1);
        assert_eq!(state.active_contents.len(), 1);
        assert!(state.active_contents.contains_key(session.audio_content_id()));
        assert!(state.audio_data_sent);
    }
}
