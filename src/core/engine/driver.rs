//! Remote stream driver.
//!
//! Opens one bidirectional stream per session, pumps the outbound queue into
//! the request body, and reads the response body, routing each decoded event
//! to the dispatcher. The transport itself sits behind the
//! [`UpstreamConnector`] trait so the engine (and every test) can run against
//! an in-process mock instead of the real service.
//!
//! # Exit Conditions
//!
//! 1. Response body ends naturally → [`EndReason::Complete`].
//! 2. `modelStreamErrorException` / `internalServerException` arrives → the
//!    corresponding [`DriverError`] is returned and the caller begins
//!    teardown.
//! 3. Transport failure, handshake timeout, or the overall stream deadline →
//!    [`DriverError`] as above.
//! 4. The session goes inactive or its close signal fires →
//!    [`EndReason::Cancelled`] / [`EndReason::Inactive`]; reading stops and
//!    the queue is no longer consumed.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};

use super::dispatch::EventDispatcher;
use super::error::{DriverError, DriverResult};
use super::events::{InboundEvent, kinds};
pub use super::outbound::RequestFrameStream;
use super::outbound;
use super::session::Session;

/// Byte-frame stream read from the upstream response body.
pub type ResponseFrameStream = Pin<Box<dyn Stream<Item = DriverResult<Bytes>> + Send>>;

// =============================================================================
// Connector Trait
// =============================================================================

/// Transport seam for the bidirectional upstream stream.
///
/// Implementations open one stream per call: the request body is the lazy
/// frame stream produced from the session's outbound queue, the return value
/// is the lazy frame stream of the response body. `open` resolves once the
/// remote has accepted the stream.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    async fn open(
        &self,
        session_id: &str,
        request: RequestFrameStream,
    ) -> DriverResult<ResponseFrameStream>;
}

// =============================================================================
// Driver
// =============================================================================

/// Timing parameters for one stream.
#[derive(Debug, Clone, Copy)]
pub struct DriverTiming {
    /// Deadline for the transport open.
    pub open_timeout: Duration,
    /// Deadline for the first inbound chunk after open.
    pub handshake_timeout: Duration,
    /// Overall deadline for the whole stream.
    pub request_timeout: Duration,
    /// Empty-queue wait bound for the request-body feed.
    pub feed_empty_wait: Duration,
}

/// Why the response loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The response body ended naturally.
    Complete,
    /// The session's close signal fired.
    Cancelled,
    /// The session went inactive mid-stream.
    Inactive,
}

/// Open the stream for a session and run its response loop to completion.
///
/// Inbound events are dispatched inline, so handlers for one session are
/// invoked sequentially with respect to each other.
pub async fn run_stream(
    session: Arc<Session>,
    connector: Arc<dyn UpstreamConnector>,
    dispatcher: Arc<EventDispatcher>,
    timing: DriverTiming,
) -> DriverResult<EndReason> {
    // The very first outbound event must be sessionStart; an empty queue is
    // re-seeded before the body is handed to the transport.
    session.reseed_session_start();
    if let Some(head) = session.head_kind()
        && head != kinds::SESSION_START
        && !session.has_produced()
    {
        warn!(
            session_id = %session.id(),
            head,
            "Queue head is not sessionStart at stream open"
        );
    }

    let feed = outbound::event_feed(session.clone(), timing.feed_empty_wait);

    let mut response = tokio::time::timeout(
        timing.open_timeout,
        connector.open(session.id(), feed),
    )
    .await
    .map_err(|_| {
        DriverError::OpenFailed(format!(
            "no response within {} seconds",
            timing.open_timeout.as_secs()
        ))
    })??;

    info!(session_id = %session.id(), "Upstream stream open");
    session.mark_driver_started();

    let close = session.close_token();
    let deadline = tokio::time::sleep(timing.request_timeout);
    tokio::pin!(deadline);

    let mut awaiting_first_chunk = true;

    loop {
        tokio::select! {
            _ = close.cancelled() => {
                debug!(session_id = %session.id(), "Close signal fired, stopping response loop");
                return Ok(EndReason::Cancelled);
            }
            _ = &mut deadline => {
                return Err(DriverError::StreamTimeout(timing.request_timeout.as_secs()));
            }
            _ = tokio::time::sleep(timing.handshake_timeout), if awaiting_first_chunk => {
                return Err(DriverError::HandshakeTimeout(timing.handshake_timeout.as_secs()));
            }
            item = response.next() => {
                match item {
                    None => {
                        info!(session_id = %session.id(), "Upstream response body ended");
                        return Ok(EndReason::Complete);
                    }
                    Some(Err(e)) => {
                        return Err(e);
                    }
                    Some(Ok(frame)) => {
                        awaiting_first_chunk = false;
                        session.touch();
                        if !session.is_active() {
                            debug!(session_id = %session.id(), "Session inactive, stopping response loop");
                            return Ok(EndReason::Inactive);
                        }

                        match InboundEvent::decode(&frame) {
                            Ok(event) => {
                                if event.kind == kinds::MODEL_STREAM_ERROR {
                                    return Err(DriverError::ModelStream(event.payload.to_string()));
                                }
                                if event.kind == kinds::INTERNAL_SERVER_ERROR {
                                    return Err(DriverError::InternalServer(event.payload.to_string()));
                                }
                                dispatcher.dispatch(&session, event).await;
                            }
                            Err(e) => {
                                warn!(session_id = %session.id(), "Skipping undecodable frame: {e}");
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::events::{InferenceConfig, OutboundEvent};
    use crate::core::tools::ToolRegistry;
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use tokio::sync::mpsc;

    fn receiver_stream(mut rx: mpsc::UnboundedReceiver<DriverResult<Bytes>>) -> ResponseFrameStream {
        Box::pin(async_stream::stream! {
            while let Some(item) = rx.recv().await {
                yield item;
            }
        })
    }

    struct ChannelConnector {
        sent: Arc<Mutex<Vec<Value>>>,
        inbound: Mutex<Option<mpsc::UnboundedReceiver<DriverResult<Bytes>>>>,
    }

    impl ChannelConnector {
        fn new() -> (Arc<Self>, mpsc::UnboundedSender<DriverResult<Bytes>>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Arc::new(Self {
                    sent: Arc::new(Mutex::new(Vec::new())),
                    inbound: Mutex::new(Some(rx)),
                }),
                tx,
            )
        }

        fn sent_kinds(&self) -> Vec<String> {
            self.sent
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
                .collect()
        }
    }

    #[async_trait]
    impl UpstreamConnector for ChannelConnector {
        async fn open(
            &self,
            _session_id: &str,
            mut request: RequestFrameStream,
        ) -> DriverResult<ResponseFrameStream> {
            let sent = self.sent.clone();
            tokio::spawn(async move {
                while let Some(frame) = request.next().await {
                    if let Ok(value) = serde_json::from_slice::<Value>(&frame) {
                        sent.lock().push(value);
                    }
                }
            });
            let rx = self.inbound.lock().take().expect("open called twice");
            Ok(receiver_stream(rx))
        }
    }

    fn timing() -> DriverTiming {
        DriverTiming {
            open_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            feed_empty_wait: Duration::from_millis(100),
        }
    }

    fn dispatcher() -> Arc<EventDispatcher> {
        Arc::new(EventDispatcher::new(ToolRegistry::new()))
    }

    fn frame(kind: &str, payload: Value) -> Bytes {
        let mut inner = serde_json::Map::new();
        inner.insert(kind.to_string(), payload);
        Bytes::from(json!({ "event": inner }).to_string())
    }

    #[tokio::test]
    async fn test_driver_reseeds_session_start_and_pumps_queue() {
        let session = Arc::new(Session::new("d1", InferenceConfig::default(), 200));
        let (connector, tx) = ChannelConnector::new();

        let driver_session = session.clone();
        let driver_connector = connector.clone();
        let handle = tokio::spawn(async move {
            run_stream(driver_session, driver_connector, dispatcher(), timing()).await
        });

        // Let the driver open with an empty queue; it must re-seed
        // sessionStart before anything else goes out.
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.enqueue(OutboundEvent::SessionEnd);
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Natural end of the response body.
        drop(tx);
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result, EndReason::Complete);

        let kinds = connector.sent_kinds();
        assert_eq!(kinds.first().map(String::as_str), Some("sessionStart"));
        assert!(kinds.contains(&"sessionEnd".to_string()));
    }

    #[tokio::test]
    async fn test_driver_dispatches_inbound_events() {
        let session = Arc::new(Session::new("d2", InferenceConfig::default(), 200));
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        session.register_handler(
            kinds::ANY,
            Arc::new(move |event| {
                let sink = sink.clone();
                Box::pin(async move {
                    sink.lock().push(event.kind.clone());
                    Ok(())
                })
            }),
        );

        let (connector, tx) = ChannelConnector::new();
        let driver_session = session.clone();
        let handle = tokio::spawn(async move {
            run_stream(driver_session, connector, dispatcher(), timing()).await
        });

        tx.send(Ok(frame("textOutput", json!({"content": "hi"}))))
            .unwrap();
        tx.send(Ok(frame("audioOutput", json!({"content": "AAAA"}))))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(tx);

        handle.await.unwrap().unwrap();
        assert_eq!(seen.lock().as_slice(), ["textOutput", "audioOutput"]);
    }

    #[tokio::test]
    async fn test_driver_classifies_model_stream_error() {
        let session = Arc::new(Session::new("d3", InferenceConfig::default(), 200));
        let (connector, tx) = ChannelConnector::new();
        let driver_session = session.clone();
        let handle = tokio::spawn(async move {
            run_stream(driver_session, connector, dispatcher(), timing()).await
        });

        tx.send(Ok(frame(
            kinds::MODEL_STREAM_ERROR,
            json!({"message": "bad sequence"}),
        )))
        .unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, DriverError::ModelStream(_)));
    }

    #[tokio::test]
    async fn test_driver_stops_on_cancellation() {
        let session = Arc::new(Session::new("d4", InferenceConfig::default(), 200));
        let (connector, tx) = ChannelConnector::new();
        let driver_session = session.clone();
        let handle = tokio::spawn(async move {
            run_stream(driver_session, connector, dispatcher(), timing()).await
        });

        // Deliver one chunk so the handshake guard is satisfied.
        tx.send(Ok(frame("textOutput", json!({"content": "hi"}))))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        session.close_token().cancel();
        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("driver should stop promptly")
            .unwrap()
            .unwrap();
        assert_eq!(result, EndReason::Cancelled);
    }

    #[tokio::test]
    async fn test_driver_handshake_timeout() {
        let session = Arc::new(Session::new("d5", InferenceConfig::default(), 200));
        let (connector, _tx) = ChannelConnector::new();
        let mut t = timing();
        t.handshake_timeout = Duration::from_millis(50);

        let err = run_stream(session, connector, dispatcher(), t)
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::HandshakeTimeout(_)));
    }

    #[tokio::test]
    async fn test_driver_malformed_frames_are_skipped() {
        let session = Arc::new(Session::new("d6", InferenceConfig::default(), 200));
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        session.register_handler(
            kinds::ANY,
            Arc::new(move |event| {
                let sink = sink.clone();
                Box::pin(async move {
                    sink.lock().push(event.kind.clone());
                    Ok(())
                })
            }),
        );

        let (connector, tx) = ChannelConnector::new();
        let driver_session = session.clone();
        let handle = tokio::spawn(async move {
            run_stream(driver_session, connector, dispatcher(), timing()).await
        });

        tx.send(Ok(Bytes::from_static(b"not json at all"))).unwrap();
        tx.send(Ok(frame("textOutput", json!({"content": "still here"}))))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(tx);

        handle.await.unwrap().unwrap();
        assert_eq!(seen.lock().as_slice(), ["textOutput"]);
    }
}
