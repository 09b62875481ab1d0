//! Conversation state types

use crate::sources::{SourceAggregator, SourceRef};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Trailer the answer model appends to name the passages it relied on
static SOURCES_TRAILER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"SOURCES:(.*)").expect("static regex is valid")
});

// ============================================================================
// Turn State
// ============================================================================

/// Lifecycle of the current turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnState {
    /// No turn has settled yet
    #[default]
    Idle,

    /// Answer stream open, assistant message being filled
    Streaming,

    /// Last turn finished or was stopped by the user
    Done,

    /// Last turn failed - partial content is kept
    Error { message: String },
}

impl TurnState {
    pub fn is_streaming(&self) -> bool {
        matches!(self, TurnState::Streaming)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TurnState::Idle => "idle",
            TurnState::Streaming => "streaming",
            TurnState::Done => "done",
            TurnState::Error { .. } => "error",
        }
    }
}

// ============================================================================
// Messages
// ============================================================================

/// One entry of the conversation as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub id: u64,
    pub is_human: bool,
    pub content: String,
    pub sources: Vec<SourceRef>,
    pub loading: bool,
}

impl ConversationMessage {
    pub fn human(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            is_human: true,
            content: text.into(),
            sources: Vec::new(),
            loading: false,
        }
    }

    pub fn placeholder(id: u64) -> Self {
        Self {
            id,
            is_human: false,
            content: String::new(),
            sources: Vec::new(),
            loading: true,
        }
    }

    /// Append one content fragment.
    ///
    /// An empty fragment is a paragraph break, except before any text has
    /// arrived where it would only produce a leading newline.
    pub fn append_fragment(&mut self, fragment: &str) {
        if fragment.is_empty() {
            if !self.content.is_empty() {
                self.content.push('\n');
            }
        } else {
            self.content.push_str(fragment);
        }
        self.loading = self.content.is_empty();
    }

    /// Content with the `SOURCES:` trailer removed
    pub fn display_content(&self) -> String {
        SOURCES_TRAILER
            .replace(&self.content, "")
            .trim_end()
            .to_string()
    }

    /// Names listed in the `SOURCES:` trailer, if the answer has one
    pub fn cited_sources(&self) -> Vec<String> {
        let unquoted = self.content.replace('"', "");
        SOURCES_TRAILER
            .captures(&unquoted)
            .and_then(|c| c.get(1))
            .map(|m| {
                m.as_str()
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ============================================================================
// Conversation
// ============================================================================

/// Everything a session knows: messages, session id, and the in-flight
/// turn's source map. Only [`transition`](super::transition) mutates it.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub(crate) state: TurnState,
    pub(crate) messages: Vec<ConversationMessage>,
    pub(crate) session_id: Option<String>,
    pub(crate) sources: SourceAggregator,
    /// Id of the assistant message the current turn writes into
    pub(crate) current: Option<u64>,
    pub(crate) next_id: u64,
    /// Turns that reached Done or Error, or were stopped after text arrived
    pub(crate) settled_turns: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            state: TurnState::Idle,
            messages: Vec::new(),
            session_id: None,
            sources: SourceAggregator::new(),
            current: None,
            next_id: 1,
            settled_turns: 0,
        }
    }

    pub fn state(&self) -> &TurnState {
        &self.state
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Sources gathered so far in the current turn
    pub fn pending_sources(&self) -> &[SourceRef] {
        self.sources.sources()
    }

    pub(crate) fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(crate) fn current_message_mut(&mut self) -> Option<&mut ConversationMessage> {
        let id = self.current?;
        self.messages.iter_mut().rev().find(|m| m.id == id)
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::new();
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
