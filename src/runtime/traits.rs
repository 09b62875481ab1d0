//! Trait abstractions for runtime I/O
//!
//! The session runtime only sees the transport through [`ChatTransport`],
//! which lets the executor be driven by scripted streams in tests.

use crate::protocol::RawFrame;
use crate::transport::TransportError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One turn's request to the chat endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub question: String,
    /// Sent as the `session_id` query parameter, never in the body
    #[serde(skip)]
    pub session_id: Option<String>,
}

impl ChatRequest {
    pub fn new(question: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            question: question.into(),
            session_id,
        }
    }
}

/// Frames of one turn, in delivery order.
///
/// An `Err` item reports a failure without ending the stream: polling again
/// lets the transport reconnect. The stream ends when the server closes the
/// body cleanly or the cancellation token fires.
pub type FrameStream = BoxStream<'static, Result<RawFrame, TransportError>>;

/// Opens answer streams
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Open the stream for one turn. `cancel` is owned by the turn; once it
    /// fires the stream must end without yielding further items.
    async fn open(&self, request: &ChatRequest, cancel: CancellationToken) -> FrameStream;
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    async fn open(&self, request: &ChatRequest, cancel: CancellationToken) -> FrameStream {
        (**self).open(request, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_stays_out_of_the_body() {
        let request = ChatRequest::new("What is PTO?", Some("abc123".to_string()));
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body, serde_json::json!({ "question": "What is PTO?" }));
    }
}
