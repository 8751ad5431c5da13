//! In-process mock of the upstream speech-to-speech service.
//!
//! Captures every frame the engine writes to the request body and lets
//! tests inject scripted inbound frames. One receiver is queued per
//! expected stream open, so re-initiation scenarios can script several
//! consecutive streams against the same connector.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{Notify, mpsc};

use sonic_gateway::core::engine::driver::{ResponseFrameStream, UpstreamConnector};
use sonic_gateway::core::engine::error::DriverResult;
use sonic_gateway::core::engine::outbound::RequestFrameStream;

/// Scripted upstream endpoint.
pub struct MockUpstream {
    sent: Arc<Mutex<Vec<Value>>>,
    sent_notify: Arc<Notify>,
    pending: Mutex<VecDeque<mpsc::UnboundedReceiver<DriverResult<Bytes>>>>,
}

impl MockUpstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            sent_notify: Arc::new(Notify::new()),
            pending: Mutex::new(VecDeque::new()),
        })
    }

    /// Queue one upstream stream and return the sender that scripts its
    /// response body. Dropping the sender ends the response body.
    pub fn push_stream(&self) -> mpsc::UnboundedSender<DriverResult<Bytes>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.pending.lock().push_back(rx);
        tx
    }

    /// Every frame the engine has sent, decoded, in order.
    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().clone()
    }

    /// The event kinds of every sent frame, in order.
    pub fn sent_kinds(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|frame| {
                frame["event"]
                    .as_object()
                    .expect("frame has an event object")
                    .keys()
                    .next()
                    .expect("event object is non-empty")
                    .clone()
            })
            .collect()
    }

    /// Wait until the captured outbound frames satisfy a predicate.
    pub async fn wait_for_sent<F>(&self, deadline: Duration, predicate: F)
    where
        F: Fn(&[Value]) -> bool,
    {
        let wait = async {
            loop {
                if predicate(&self.sent.lock()) {
                    return;
                }
                let notified = self.sent_notify.notified();
                if predicate(&self.sent.lock()) {
                    return;
                }
                notified.await;
            }
        };
        if tokio::time::timeout(deadline, wait).await.is_err() {
            panic!(
                "upstream never satisfied predicate; sent so far: {:?}",
                self.sent_kinds()
            );
        }
    }

    /// Wait until at least `count` outbound frames were captured.
    pub async fn wait_for_count(&self, count: usize, deadline: Duration) {
        self.wait_for_sent(deadline, |sent| sent.len() >= count).await;
    }
}

#[async_trait]
impl UpstreamConnector for MockUpstream {
    async fn open(
        &self,
        _session_id: &str,
        mut request: RequestFrameStream,
    ) -> DriverResult<ResponseFrameStream> {
        let rx = self
            .pending
            .lock()
            .pop_front()
            .expect("no scripted stream queued; call push_stream() before initiating");

        // Drain the request body into the capture buffer.
        let sent = self.sent.clone();
        let notify = self.sent_notify.clone();
        tokio::spawn(async move {
            while let Some(frame) = request.next().await {
                if let Ok(value) = serde_json::from_slice::<Value>(&frame) {
                    sent.lock().push(value);
                    notify.notify_waiters();
                }
            }
        });

        let response = async_stream::stream! {
            let mut rx = rx;
            while let Some(item) = rx.recv().await {
                yield item;
            }
        };
        Ok(Box::pin(response))
    }
}

/// Build a framed inbound event.
pub fn frame(kind: &str, payload: Value) -> DriverResult<Bytes> {
    let mut inner = serde_json::Map::new();
    inner.insert(kind.to_string(), payload);
    Ok(Bytes::from(json!({ "event": inner }).to_string()))
}
