//! State transition function
//!
//! Every mutation of a [`Conversation`] goes through [`transition`]. It does
//! no I/O; opening and aborting the stream are returned as effects.

use super::state::ConversationMessage;
use super::{Conversation, Effect, Event, TurnState};
use crate::protocol::StreamToken;
use thiserror::Error;

/// Message recorded when the body ends without a `[DONE]` frame
pub const STREAM_CLOSED_MESSAGE: &str = "Answer stream closed before completion";

/// Result of a state transition
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TransitionResult {
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A turn is already streaming (cancel it first)")]
    TurnInFlight,
}

/// Apply one event to the conversation.
pub fn transition(
    conv: &mut Conversation,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let streaming = conv.state.is_streaming();

    match event {
        // ============================================================
        // Turn start
        // ============================================================
        Event::UserQuestion { .. } if streaming => Err(TransitionError::TurnInFlight),

        Event::UserQuestion { text } => {
            let human_id = conv.allocate_id();
            conv.messages.push(ConversationMessage::human(human_id, text.clone()));

            let answer_id = conv.allocate_id();
            conv.messages.push(ConversationMessage::placeholder(answer_id));
            conv.current = Some(answer_id);

            conv.sources.reset();
            conv.state = TurnState::Streaming;

            Ok(TransitionResult::none().with_effect(Effect::open(text, conv.session_id.clone())))
        }

        // ============================================================
        // Stream input
        // ============================================================
        Event::Token(token) if streaming => Ok(apply_token(conv, token)),

        Event::TransportFailed { message } if streaming => Ok(fail(conv, message)),

        Event::StreamClosed if streaming => Ok(fail(conv, STREAM_CLOSED_MESSAGE.to_string())),

        // Late input from a turn that already settled
        Event::Token(_) | Event::TransportFailed { .. } | Event::StreamClosed => {
            tracing::debug!(state = conv.state.name(), "Ignoring stream input outside a turn");
            Ok(TransitionResult::none())
        }

        // ============================================================
        // Cancellation and reset
        // ============================================================
        Event::UserCancel if streaming => {
            let prior_turns = conv.settled_turns;
            let current = conv.current.take();
            let pending = conv.sources.finish();

            let mut kept_partial = false;
            if let Some(pos) = current.and_then(|id| conv.messages.iter().rposition(|m| m.id == id)) {
                if conv.messages[pos].content.is_empty() {
                    conv.messages.remove(pos);
                } else {
                    let msg = &mut conv.messages[pos];
                    msg.loading = false;
                    msg.sources = pending;
                    kept_partial = true;
                }
            }

            conv.state = if prior_turns > 0 {
                TurnState::Done
            } else {
                TurnState::Idle
            };
            if kept_partial {
                conv.settled_turns += 1;
            }

            Ok(TransitionResult::none().with_effect(Effect::AbortTransport))
        }

        Event::UserCancel => Ok(TransitionResult::none()),

        Event::Reset => {
            conv.clear();
            let result = TransitionResult::none();
            Ok(if streaming {
                result.with_effect(Effect::AbortTransport)
            } else {
                result
            })
        }
    }
}

fn apply_token(conv: &mut Conversation, token: StreamToken) -> TransitionResult {
    match token {
        StreamToken::Content(fragment) => {
            if let Some(msg) = conv.current_message_mut() {
                msg.append_fragment(&fragment);
            }
            TransitionResult::none()
        }
        StreamToken::Session(id) => {
            // Blank ids are never stored
            if id.trim().is_empty() {
                tracing::warn!("Ignoring blank session id");
            } else {
                conv.session_id = Some(id);
            }
            TransitionResult::none()
        }
        StreamToken::Source(payload) => {
            conv.sources.add(payload);
            TransitionResult::none()
        }
        StreamToken::Done => {
            settle(conv, TurnState::Done);
            TransitionResult::none().with_effect(Effect::AbortTransport)
        }
        StreamToken::Fatal(message) => fail(conv, message),
        StreamToken::Ignored(_) => TransitionResult::none(),
    }
}

fn fail(conv: &mut Conversation, message: String) -> TransitionResult {
    settle(conv, TurnState::Error { message });
    TransitionResult::none().with_effect(Effect::AbortTransport)
}

/// Seal the turn: attach sources, stop loading, and enter `state`.
fn settle(conv: &mut Conversation, state: TurnState) {
    let sources = conv.sources.finish();
    if let Some(msg) = conv.current_message_mut() {
        msg.sources = sources;
        msg.loading = false;
    }
    conv.current = None;
    conv.settled_turns += 1;
    conv.state = state;
}
