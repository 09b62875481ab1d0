//! Answer Stream - client for streamed, source-cited chat answers
//!
//! Sends a question to a retrieval-augmented chat backend, follows the
//! server-sent event stream it answers with, and folds the frames into a
//! conversation of messages with their cited sources.

pub mod config;
pub mod logging;
pub mod protocol;
pub mod runtime;
pub mod sources;
pub mod state_machine;
pub mod transport;

pub use config::{ClientConfig, ConfigError};
pub use runtime::{ChatSession, SessionError, Snapshot, TurnId};
pub use sources::SourceRef;
pub use state_machine::{ConversationMessage, TurnState};
