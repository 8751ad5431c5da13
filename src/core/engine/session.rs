//! Per-session mutable state.
//!
//! A [`Session`] is the unit the whole engine revolves around: it owns the
//! outbound event queue that feeds the upstream request body, the tracking
//! structures that make ordered teardown possible, the handler map for
//! inbound dispatch, and the two signals (`queue_signal`, `close`) every
//! suspension point in the engine observes.
//!
//! # Synchronization
//!
//! Internal state is guarded by short non-async `parking_lot` locks; no lock
//! is held across an await point. Lock ordering, where both are taken, is
//! always tracking state before queue. The active flag is a one-way
//! `AtomicBool`: once a session goes inactive it never comes back, the queue
//! accepts no further events (late enqueues are silently dropped), and the
//! queue consumer stops yielding.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::events::{ContentKind, InboundEvent, InferenceConfig, OutboundEvent, Role};

// =============================================================================
// Handler Type
// =============================================================================

/// Async callback invoked for inbound events of a registered kind.
///
/// Handler errors are logged and suppressed by the dispatcher; they never
/// interrupt the response loop.
pub type EventHandler = Arc<
    dyn Fn(InboundEvent) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send + Sync,
>;

// =============================================================================
// Outbound Queue
// =============================================================================

/// Bounded FIFO of pending outbound events.
///
/// The bound applies to `audioInput` items only: when the queue already
/// holds `bound` audio items, the oldest audio item is discarded before a
/// new one is accepted. Non-audio events are never dropped.
struct OutboundQueue {
    items: VecDeque<OutboundEvent>,
    audio_len: usize,
}

impl OutboundQueue {
    fn new() -> Self {
        Self {
            items: VecDeque::new(),
            audio_len: 0,
        }
    }

    fn push(&mut self, event: OutboundEvent, bound: usize) -> bool {
        let mut dropped = false;
        if event.is_audio() {
            if self.audio_len >= bound
                && let Some(pos) = self.items.iter().position(OutboundEvent::is_audio)
            {
                self.items.remove(pos);
                self.audio_len -= 1;
                dropped = true;
            }
            self.audio_len += 1;
        }
        self.items.push_back(event);
        dropped
    }

    fn pop(&mut self) -> Option<OutboundEvent> {
        let event = self.items.pop_front()?;
        if event.is_audio() {
            self.audio_len -= 1;
        }
        Some(event)
    }
}

// =============================================================================
// Tracking State
// =============================================================================

/// Tracking structures and progress flags, guarded by one lock.
///
/// Teardown is driven from `active_prompts` and `active_contents`, never
/// from the boolean flags alone: the invariant is that `active_contents`
/// holds exactly the content IDs with a `contentStart` sent and no
/// `contentEnd` sent, and `active_prompts` the prompts with a `promptStart`
/// sent and no `promptEnd` sent.
#[derive(Debug, Default)]
pub struct SessionState {
    pub prompt_start_sent: bool,
    pub audio_content_start_sent: bool,
    /// At least one audio chunk (possibly the sentinel) has been enqueued
    /// for the open audio content block.
    pub audio_data_sent: bool,
    /// Prompts opened upstream and not yet closed.
    pub active_prompts: HashSet<String>,
    /// Content ID to owning prompt ID, for every open content block.
    pub active_contents: HashMap<String, String>,
    /// Scratch correlating a pending tool call to its result.
    pub tool_use_id: Option<String>,
    pub tool_name: Option<String>,
    pub tool_use_content: Option<String>,
    /// Consumed once at initiation, in place of the configured default.
    pub custom_system_prompt: Option<String>,
}

// =============================================================================
// Session
// =============================================================================

/// One end-to-end conversation between a client and the remote service.
pub struct Session {
    id: String,
    prompt_name: String,
    audio_content_id: String,
    inference: InferenceConfig,
    queue_bound: usize,

    active: AtomicBool,
    driver_started: AtomicBool,
    produced_any: AtomicBool,
    terminal_sent: AtomicBool,

    queue: Mutex<OutboundQueue>,
    queue_signal: Notify,
    close: CancellationToken,

    state: Mutex<SessionState>,
    handlers: RwLock<HashMap<String, EventHandler>>,
    last_activity: Mutex<Instant>,
}

impl Session {
    /// Create a session record with fresh prompt and audio content IDs.
    pub fn new(id: &str, inference: InferenceConfig, queue_bound: usize) -> Self {
        Self {
            id: id.to_string(),
            prompt_name: Uuid::new_v4().to_string(),
            audio_content_id: Uuid::new_v4().to_string(),
            inference,
            queue_bound,
            active: AtomicBool::new(true),
            driver_started: AtomicBool::new(false),
            produced_any: AtomicBool::new(false),
            terminal_sent: AtomicBool::new(false),
            queue: Mutex::new(OutboundQueue::new()),
            queue_signal: Notify::new(),
            close: CancellationToken::new(),
            state: Mutex::new(SessionState::default()),
            handlers: RwLock::new(HashMap::new()),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Prompt identifier reused for every event of this session's prompt.
    pub fn prompt_name(&self) -> &str {
        &self.prompt_name
    }

    /// Content identifier of the single open user-audio block.
    pub fn audio_content_id(&self) -> &str {
        &self.audio_content_id
    }

    pub fn inference(&self) -> InferenceConfig {
        self.inference
    }

    // -------------------------------------------------------------------------
    // Lifecycle Flags
    // -------------------------------------------------------------------------

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// One-way transition to inactive. Returns `true` on the first call.
    pub fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::SeqCst)
    }

    /// Cancellation token fired when the session is torn down.
    pub fn close_token(&self) -> CancellationToken {
        self.close.clone()
    }

    pub fn mark_driver_started(&self) {
        self.driver_started.store(true, Ordering::SeqCst);
    }

    pub fn driver_started(&self) -> bool {
        self.driver_started.load(Ordering::SeqCst)
    }

    /// Reserve the right to emit the single terminal `streamComplete`.
    /// Returns `true` exactly once per session.
    pub fn try_mark_terminal(&self) -> bool {
        !self.terminal_sent.swap(true, Ordering::SeqCst)
    }

    // -------------------------------------------------------------------------
    // Activity Tracking
    // -------------------------------------------------------------------------

    /// Record activity; called on every outbound enqueue and inbound chunk.
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Time since the last outbound or inbound event.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    // -------------------------------------------------------------------------
    // Outbound Queue
    // -------------------------------------------------------------------------

    /// Append an event and wake the queue consumer.
    ///
    /// Enqueueing on an inactive session is a silent drop: the late event is
    /// discarded and the caller is not failed.
    pub fn enqueue(&self, event: OutboundEvent) {
        if !self.is_active() {
            debug!(session_id = %self.id, kind = event.kind(), "Dropping event for inactive session");
            return;
        }
        self.touch();
        let dropped = self.queue.lock().push(event, self.queue_bound);
        if dropped {
            debug!(session_id = %self.id, "Audio queue at capacity, dropped oldest chunk");
        }
        self.queue_signal.notify_one();
    }

    /// Pop the next pending event in enqueue order.
    pub fn pop_event(&self) -> Option<OutboundEvent> {
        self.queue.lock().pop()
    }

    /// Wire kind of the event at the queue head, if any.
    pub fn head_kind(&self) -> Option<&'static str> {
        self.queue.lock().items.front().map(OutboundEvent::kind)
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.lock().items.len()
    }

    pub fn queue_audio_depth(&self) -> usize {
        self.queue.lock().audio_len
    }

    pub fn is_queue_empty(&self) -> bool {
        self.queue.lock().items.is_empty()
    }

    /// Notification the queue consumer parks on while the queue is empty.
    pub fn queue_signal(&self) -> &Notify {
        &self.queue_signal
    }

    /// Place a `sessionStart` at the queue head if the queue is empty.
    ///
    /// The driver calls this before opening the stream; the consumer calls
    /// it when its empty-wait timer fires before anything was produced.
    pub fn reseed_session_start(&self) {
        if !self.is_active() {
            return;
        }
        let mut queue = self.queue.lock();
        if queue.items.is_empty() {
            queue.items.push_front(OutboundEvent::SessionStart {
                inference: self.inference,
            });
        }
        drop(queue);
        self.queue_signal.notify_one();
    }

    pub fn mark_produced(&self) {
        self.produced_any.store(true, Ordering::SeqCst);
    }

    /// Whether the consumer has ever yielded an item.
    pub fn has_produced(&self) -> bool {
        self.produced_any.load(Ordering::SeqCst)
    }

    // -------------------------------------------------------------------------
    // Audio
    // -------------------------------------------------------------------------

    /// Enqueue a raw PCM16 chunk as a base64 `audioInput` event.
    pub fn stream_audio(&self, pcm: &[u8]) {
        {
            let mut state = self.state.lock();
            state.audio_data_sent = true;
        }
        self.enqueue(OutboundEvent::audio_input(
            &self.prompt_name,
            &self.audio_content_id,
            pcm,
        ));
    }

    /// Whether the audio content block is open and accepting chunks.
    pub fn is_audio_ready(&self) -> bool {
        self.is_active() && self.state.lock().audio_content_start_sent
    }

    // -------------------------------------------------------------------------
    // Tracking State
    // -------------------------------------------------------------------------

    /// Lock the tracking state. Never hold the guard across an await.
    pub fn state(&self) -> parking_lot::MutexGuard<'_, SessionState> {
        self.state.lock()
    }

    /// Enqueue a complete tool-result content block.
    ///
    /// The start/result/end triple is emitted under the tracking lock so
    /// teardown can never interleave inside the block; the content ID enters
    /// and leaves `active_contents` within the same critical section.
    pub fn push_tool_result(&self, tool_use_id: &str, result_json: &str) {
        let content_name = Uuid::new_v4().to_string();
        let mut state = self.state.lock();
        state
            .active_contents
            .insert(content_name.clone(), self.prompt_name.clone());
        self.enqueue(OutboundEvent::ContentStart {
            prompt_name: self.prompt_name.clone(),
            content_name: content_name.clone(),
            kind: ContentKind::Tool,
            role: Role::Tool,
            interactive: false,
            tool_use_id: Some(tool_use_id.to_string()),
        });
        self.enqueue(OutboundEvent::ToolResult {
            prompt_name: self.prompt_name.clone(),
            content_name: content_name.clone(),
            content: result_json.to_string(),
        });
        self.enqueue(OutboundEvent::ContentEnd {
            prompt_name: self.prompt_name.clone(),
            content_name: content_name.clone(),
        });
        state.active_contents.remove(&content_name);
    }

    // -------------------------------------------------------------------------
    // Handlers
    // -------------------------------------------------------------------------

    /// Register (or replace) the handler for an event kind, including `any`.
    pub fn register_handler(&self, kind: &str, handler: EventHandler) {
        self.handlers.write().insert(kind.to_string(), handler);
    }

    pub fn handler_for(&self, kind: &str) -> Option<EventHandler> {
        self.handlers.read().get(kind).cloned()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("prompt_name", &self.prompt_name)
            .field("active", &self.is_active())
            .field("queue_depth", &self.queue_depth())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
