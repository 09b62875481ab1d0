//! Events that drive a conversation

use crate::protocol::StreamToken;

/// Input to [`transition`](super::transition)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // User events
    UserQuestion { text: String },
    UserCancel,
    Reset,

    // Stream events
    Token(StreamToken),
    /// A fatal transport failure, or a retriable one past the retry budget
    TransportFailed { message: String },
    /// The transport ended cleanly without a `[DONE]` frame
    StreamClosed,
}

impl Event {
    pub fn question(text: impl Into<String>) -> Self {
        Event::UserQuestion { text: text.into() }
    }
}
