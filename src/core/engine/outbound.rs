//! Lazy producer feeding the upstream request body.
//!
//! The outbound queue plus its wakeup signal form the channel between the
//! gateway and the HTTP/2 request body: [`event_feed`] wraps them as a lazy
//! byte stream that the remote stream driver hands to the transport. The
//! remote protocol is bidirectional and only closes once `sessionEnd` has
//! been sent, so the body must stay open and producer-driven for the whole
//! life of the session.
//!
//! # Contract
//!
//! - Items are yielded in strict enqueue order, encoded at yield time.
//! - When the queue is empty the stream suspends until a new item is
//!   enqueued, the close signal fires, or a bounded wait timer elapses.
//! - The close signal ends the stream; an inactive session stops it from
//!   yielding anything further.
//! - If the wait timer fires while the queue is still empty and nothing has
//!   ever been produced, a diagnostic is logged and `sessionStart` is
//!   re-seeded so the stream never opens on a silent body.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use tracing::{trace, warn};

use super::session::Session;

/// Byte-frame stream type fed into the upstream request body.
pub type RequestFrameStream = Pin<Box<dyn Stream<Item = Bytes> + Send + Sync>>;

/// Build the request-body stream over a session's outbound queue.
///
/// `empty_wait` bounds how long the consumer parks on an empty queue before
/// re-checking state; production configures it at 10 s or less, tests use
/// millisecond values.
pub fn event_feed(session: Arc<Session>, empty_wait: Duration) -> RequestFrameStream {
    let stream = async_stream::stream! {
        loop {
            if !session.is_active() {
                trace!(session_id = %session.id(), "Session inactive, ending event feed");
                break;
            }

            if let Some(event) = session.pop_event() {
                trace!(session_id = %session.id(), kind = event.kind(), "Yielding outbound event");
                session.mark_produced();
                yield event.encode_frame();
                continue;
            }

            // Register for the wakeup before re-checking the queue so an
            // enqueue racing this gap is not missed; notify_one stores a
            // permit when nobody is parked yet.
            let notified = session.queue_signal().notified();
            if let Some(event) = session.pop_event() {
                session.mark_produced();
                yield event.encode_frame();
                continue;
            }

            let close = session.close_token();
            tokio::select! {
                _ = notified => {}
                _ = close.cancelled() => {
                    trace!(session_id = %session.id(), "Close signal fired, ending event feed");
                    break;
                }
                _ = tokio::time::sleep(empty_wait) => {
                    if session.is_queue_empty() && !session.has_produced() {
                        warn!(
                            session_id = %session.id(),
                            "Queue empty after {:?} with nothing produced, re-seeding sessionStart",
                            empty_wait
                        );
                        session.reseed_session_start();
                    }
                }
            }
        }
    };
    Box::pin(stream)
}
