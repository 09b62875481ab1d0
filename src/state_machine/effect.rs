//! Effects produced by state transitions

/// Work for the runtime to perform after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open the answer stream for a new turn
    OpenTransport {
        question: String,
        session_id: Option<String>,
    },

    /// Stop the current turn's stream and release its connection
    AbortTransport,
}

impl Effect {
    pub fn open(question: impl Into<String>, session_id: Option<String>) -> Self {
        Effect::OpenTransport {
            question: question.into(),
            session_id,
        }
    }
}
