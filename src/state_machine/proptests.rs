//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across arbitrary event sequences.

use super::*;
use crate::protocol::{SourcePayload, StreamToken};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_source() -> impl Strategy<Value = SourcePayload> {
    (prop_oneof![Just("doc1"), Just("doc2"), Just("doc3")], "[a-c]{1,2}")
        .prop_map(|(name, content)| SourcePayload::new(name, content))
}

fn arb_token() -> impl Strategy<Value = StreamToken> {
    prop_oneof![
        4 => "[a-z ]{0,8}".prop_map(StreamToken::Content),
        1 => "[a-f0-9]{6}".prop_map(StreamToken::Session),
        2 => arb_source().prop_map(StreamToken::Source),
        1 => Just(StreamToken::Done),
        1 => "[a-z ]{1,10}".prop_map(StreamToken::Fatal),
        1 => Just(StreamToken::Ignored("bad".to_string())),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        2 => "[a-z?]{1,12}".prop_map(|text| Event::UserQuestion { text }),
        8 => arb_token().prop_map(Event::Token),
        1 => Just(Event::UserCancel),
        1 => Just(Event::Reset),
        1 => Just(Event::StreamClosed),
        1 => "[a-z ]{1,10}".prop_map(|message| Event::TransportFailed { message }),
    ]
}

fn loading_count(conv: &Conversation) -> usize {
    conv.messages().iter().filter(|m| m.loading).count()
}

// ============================================================================
// Invariants
// ============================================================================

proptest! {
    #[test]
    fn at_most_one_message_is_loading(events in proptest::collection::vec(arb_event(), 0..60)) {
        let mut conv = Conversation::new();
        for event in events {
            let _ = transition(&mut conv, event);
            prop_assert!(loading_count(&conv) <= 1);
            if loading_count(&conv) == 1 {
                prop_assert!(conv.state().is_streaming());
            }
        }
    }

    #[test]
    fn message_ids_are_strictly_increasing(events in proptest::collection::vec(arb_event(), 0..60)) {
        let mut conv = Conversation::new();
        for event in events {
            let _ = transition(&mut conv, event);
            let ids: Vec<u64> = conv.messages().iter().map(|m| m.id).collect();
            prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn content_only_grows_while_streaming(events in proptest::collection::vec(arb_token(), 0..40)) {
        let mut conv = Conversation::new();
        transition(&mut conv, Event::question("q")).unwrap();

        let mut previous = String::new();
        for token in events {
            let _ = transition(&mut conv, Event::Token(token));
            let content = conv.messages()[1].content.clone();
            prop_assert!(content.starts_with(&previous));
            previous = content;
        }
    }

    #[test]
    fn settled_turn_is_frozen(
        before in proptest::collection::vec(arb_token(), 0..20),
        after in proptest::collection::vec(arb_token(), 0..20),
        fatal in any::<bool>(),
    ) {
        let mut conv = Conversation::new();
        transition(&mut conv, Event::question("q")).unwrap();
        for token in before {
            if !conv.state().is_streaming() {
                break;
            }
            transition(&mut conv, Event::Token(token)).unwrap();
        }
        if conv.state().is_streaming() {
            let last = if fatal {
                StreamToken::Fatal("boom".to_string())
            } else {
                StreamToken::Done
            };
            transition(&mut conv, Event::Token(last)).unwrap();
        }

        let frozen = conv.messages().to_vec();
        let state = conv.state().clone();
        for token in after {
            let result = transition(&mut conv, Event::Token(token)).unwrap();
            prop_assert!(result.effects.is_empty());
        }
        prop_assert_eq!(conv.messages(), frozen.as_slice());
        prop_assert_eq!(conv.state(), &state);
    }

    #[test]
    fn every_turn_start_opens_exactly_one_transport(events in proptest::collection::vec(arb_event(), 0..60)) {
        let mut conv = Conversation::new();
        for event in events {
            let starting = matches!(event, Event::UserQuestion { .. });
            let was_streaming = conv.state().is_streaming();
            match transition(&mut conv, event) {
                Ok(result) => {
                    let opens = result
                        .effects
                        .iter()
                        .filter(|e| matches!(e, Effect::OpenTransport { .. }))
                        .count();
                    prop_assert_eq!(opens, usize::from(starting));
                }
                Err(TransitionError::TurnInFlight) => {
                    prop_assert!(starting && was_streaming);
                }
            }
        }
    }

    #[test]
    fn reset_always_yields_empty_idle_conversation(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut conv = Conversation::new();
        for event in events {
            let _ = transition(&mut conv, event);
        }
        transition(&mut conv, Event::Reset).unwrap();
        prop_assert_eq!(conv.state(), &TurnState::Idle);
        prop_assert!(conv.messages().is_empty());
        prop_assert!(conv.session_id().is_none());
        prop_assert!(conv.pending_sources().is_empty());
    }
}
