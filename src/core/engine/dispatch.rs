//! Inbound event dispatch and tool-call correlation.
//!
//! Each decoded inbound event is routed to the session's handler for its
//! kind, then to the `any` handler when registered. Handlers run
//! sequentially for a given session; a handler error is logged and
//! suppressed so it can never interrupt the response loop.
//!
//! A tool call arrives as a pair: `toolUse` carries the tool name, tool-use
//! ID, and argument payload, and the following `contentEnd` of sub-type
//! `TOOL` triggers the invocation. The invoker runs on its own task and
//! re-enters its result into the outbound queue as a full TOOL content
//! block, so tool round-trips interleave freely with live audio and the
//! response loop never blocks on a tool.

use std::sync::Arc;

use tracing::{debug, error, warn};

use super::events::{InboundEvent, kinds};
use super::session::Session;
use crate::core::tools::ToolRegistry;

/// Invoke the registered handlers for one event, kind handler first, then
/// `any`. Handler errors are logged and suppressed.
pub async fn emit_event(session: &Arc<Session>, event: InboundEvent) {
    if let Some(handler) = session.handler_for(&event.kind) {
        if let Err(e) = handler(event.clone()).await {
            error!(
                session_id = %session.id(),
                kind = %event.kind,
                "Handler error (suppressed): {e:#}"
            );
        }
    }
    if let Some(handler) = session.handler_for(kinds::ANY) {
        if let Err(e) = handler(event.clone()).await {
            error!(
                session_id = %session.id(),
                kind = %event.kind,
                "'any' handler error (suppressed): {e:#}"
            );
        }
    }
}

/// Routes inbound events to per-session handlers and drives tool round-trips.
pub struct EventDispatcher {
    tools: ToolRegistry,
}

impl EventDispatcher {
    pub fn new(tools: ToolRegistry) -> Self {
        Self { tools }
    }

    /// Dispatch one inbound event for a session.
    pub async fn dispatch(&self, session: &Arc<Session>, event: InboundEvent) {
        self.correlate(session, &event);
        emit_event(session, event.clone()).await;

        if event.kind == kinds::CONTENT_END && event.content_type() == Some("TOOL") {
            self.spawn_tool_invocation(session);
        }
    }

    /// Capture tool-use details into the session scratch fields.
    ///
    /// The `toolUse` event and the `contentEnd(TOOL)` that triggers the
    /// invocation arrive separately; the scratch carries the correlation.
    fn correlate(&self, session: &Arc<Session>, event: &InboundEvent) {
        if let Some(tool_use) = event.tool_use() {
            debug!(
                session_id = %session.id(),
                tool = %tool_use.tool_name,
                tool_use_id = %tool_use.tool_use_id,
                "Captured tool use request"
            );
            let mut state = session.state();
            state.tool_use_id = Some(tool_use.tool_use_id);
            state.tool_name = Some(tool_use.tool_name);
            state.tool_use_content = Some(tool_use.content);
        }
    }

    /// Run the captured tool call on its own task and enqueue the result.
    fn spawn_tool_invocation(&self, session: &Arc<Session>) {
        let (tool_use_id, tool_name, args) = {
            let mut state = session.state();
            match (
                state.tool_use_id.take(),
                state.tool_name.take(),
                state.tool_use_content.take(),
            ) {
                (Some(id), Some(name), content) => {
                    (id, name, content.unwrap_or_else(|| "{}".to_string()))
                }
                _ => {
                    warn!(
                        session_id = %session.id(),
                        "contentEnd(TOOL) without a captured toolUse, ignoring"
                    );
                    return;
                }
            }
        };

        let tools = self.tools.clone();
        let session = session.clone();
        tokio::spawn(async move {
            debug!(
                session_id = %session.id(),
                tool = %tool_name,
                "Invoking tool"
            );
            match tools.invoke(&tool_name, &args).await {
                Ok(result) => {
                    session.push_tool_result(&tool_use_id, &result.to_string());
                }
                Err(e) => {
                    error!(
                        session_id = %session.id(),
                        tool = %tool_name,
                        "Tool invocation failed: {e}"
                    );
                    let event = InboundEvent::error(
                        &format!("Tool '{tool_name}' failed"),
                        Some(&e.to_string()),
                    );
                    emit_event(&session, event).await;
                }
            }
        });
    }
}
