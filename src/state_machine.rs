//! Turn state machine
//!
//! Owns the conversation and applies decoded stream input to it. The
//! transition function performs no I/O: it mutates the conversation and
//! returns the effects the runtime must carry out.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{Conversation, ConversationMessage, TurnState};
pub use transition::{transition, TransitionError, TransitionResult};
