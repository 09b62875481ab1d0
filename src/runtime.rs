//! Session runtime
//!
//! A [`ChatSession`] handle talks to one background task that owns the
//! conversation. Commands from handles and frames from the turn's reader
//! task are applied on that task in arrival order.

mod executor;
mod session;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use session::{ChatSession, SessionError, Snapshot, TurnId};
pub use traits::*;
