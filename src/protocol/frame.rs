//! Frame classification

use super::source::SourcePayload;
use serde::{Deserialize, Serialize};

/// Named event carrying a terminal server-side failure
pub const FATAL_EVENT: &str = "FatalError";
pub const SESSION_PREFIX: &str = "[SESSION_ID] ";
pub const SOURCE_PREFIX: &str = "[SOURCE] ";
pub const DONE_SENTINEL: &str = "[DONE]";

/// One event as delivered by the streaming transport
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawFrame {
    /// Event name; `None` for plain `data:` frames
    pub event: Option<String>,
    pub data: String,
}

impl RawFrame {
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
        }
    }

    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            data: data.into(),
        }
    }
}

/// Decoded meaning of a single frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamToken {
    /// Answer text. May be empty, which signals a paragraph break.
    Content(String),
    Session(String),
    Source(SourcePayload),
    Done,
    Fatal(String),
    /// A control frame that could not be understood; applied as a no-op
    Ignored(String),
}

impl StreamToken {
    pub fn kind(&self) -> &'static str {
        match self {
            StreamToken::Content(_) => "content",
            StreamToken::Session(_) => "session",
            StreamToken::Source(_) => "source",
            StreamToken::Done => "done",
            StreamToken::Fatal(_) => "fatal",
            StreamToken::Ignored(_) => "ignored",
        }
    }
}

/// Classify one frame. Pure: no state is carried between calls.
pub fn decode(frame: &RawFrame) -> StreamToken {
    if frame.event.as_deref() == Some(FATAL_EVENT) {
        return StreamToken::Fatal(frame.data.clone());
    }

    let data = frame.data.as_str();

    if let Some(id) = data.strip_prefix(SESSION_PREFIX) {
        let id = id.trim();
        if id.is_empty() {
            tracing::warn!("Discarding session frame without an id");
            return StreamToken::Ignored("blank session id".to_string());
        }
        return StreamToken::Session(id.to_string());
    }

    if let Some(raw) = data.strip_prefix(SOURCE_PREFIX) {
        return match SourcePayload::parse(raw) {
            Ok(payload) => StreamToken::Source(payload),
            Err(e) => {
                tracing::warn!(error = %e, payload = %raw, "Discarding unreadable source frame");
                StreamToken::Ignored(e.to_string())
            }
        };
    }

    if data == DONE_SENTINEL {
        return StreamToken::Done;
    }

    StreamToken::Content(data.to_string())
}
