//! Test doubles for the session runtime

use super::session::{ChatSession, Snapshot};
use super::traits::{ChatRequest, ChatTransport, FrameStream};
use crate::protocol::RawFrame;
use crate::transport::TransportError;
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Transport whose streams are fed by the test.
///
/// Every `open` hands a [`MockConnection`] to [`ChannelTransport::next_connection`].
pub struct ChannelTransport {
    opened_tx: mpsc::UnboundedSender<MockConnection>,
    opened_rx: Mutex<mpsc::UnboundedReceiver<MockConnection>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        let (opened_tx, opened_rx) = mpsc::unbounded_channel();
        Self {
            opened_tx,
            opened_rx: Mutex::new(opened_rx),
        }
    }

    pub async fn next_connection(&self) -> MockConnection {
        let mut rx = self.opened_rx.lock().await;
        tokio::time::timeout(TEST_TIMEOUT, rx.recv())
            .await
            .expect("no stream was opened")
            .expect("transport dropped")
    }
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for ChannelTransport {
    async fn open(&self, request: &ChatRequest, cancel: CancellationToken) -> FrameStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = self.opened_tx.send(MockConnection {
            request: request.clone(),
            cancel: cancel.clone(),
            tx,
        });
        UnboundedReceiverStream::new(rx)
            .take_until(cancel.cancelled_owned())
            .boxed()
    }
}

/// Server side of one opened stream. Dropping it ends the stream.
pub struct MockConnection {
    pub request: ChatRequest,
    pub cancel: CancellationToken,
    tx: mpsc::UnboundedSender<Result<RawFrame, TransportError>>,
}

impl MockConnection {
    pub fn frame(&self, data: &str) -> bool {
        self.tx.send(Ok(RawFrame::data(data))).is_ok()
    }

    pub fn named(&self, event: &str, data: &str) -> bool {
        self.tx.send(Ok(RawFrame::named(event, data))).is_ok()
    }

    pub fn fail(&self, error: TransportError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }
}

/// Wait for a snapshot matching `predicate`, failing the test after a timeout.
pub async fn wait_until(session: &ChatSession, predicate: impl Fn(&Snapshot) -> bool) -> Snapshot {
    let mut rx = session.subscribe();
    let snapshot = tokio::time::timeout(TEST_TIMEOUT, rx.wait_for(|s| predicate(s)))
        .await
        .expect("condition not reached")
        .expect("session runtime stopped");
    snapshot.clone()
}
