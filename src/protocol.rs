//! Answer stream wire protocol
//!
//! Classifies each server-sent frame into a control token or a content
//! fragment. The backend interleaves control sentinels with answer text on
//! the same `data:` channel, so every frame is decided exactly once here.

mod frame;
mod source;

pub use frame::{decode, RawFrame, StreamToken, DONE_SENTINEL, FATAL_EVENT, SESSION_PREFIX, SOURCE_PREFIX};
pub use source::{ParseError, SourcePayload};
