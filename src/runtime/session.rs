//! Public handle over a session runtime

use super::executor::{Command, SessionRuntime};
use super::traits::ChatTransport;
use crate::config::{ClientConfig, ConfigError};
use crate::state_machine::{ConversationMessage, TurnState};
use crate::transport::HttpTransport;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;

/// Identifies one question/answer turn within a session
pub type TurnId = u64;

/// Read-only view of the conversation, published after every change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Most recent turn the runtime has begun processing
    pub turn: TurnId,
    pub state: TurnState,
    pub messages: Vec<ConversationMessage>,
    pub session_id: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session runtime has stopped")]
    Closed,
}

#[derive(Debug, Clone)]
pub(crate) struct ActiveTurn {
    pub(crate) id: TurnId,
    pub(crate) cancel: CancellationToken,
}

pub(crate) type TurnSlot = Arc<Mutex<Option<ActiveTurn>>>;

pub(crate) fn lock_slot(slot: &TurnSlot) -> MutexGuard<'_, Option<ActiveTurn>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to one chat session.
///
/// Clones share the same runtime task. The task stops once every handle is
/// dropped, aborting any stream that is still open.
#[derive(Debug, Clone)]
pub struct ChatSession {
    command_tx: mpsc::UnboundedSender<Command>,
    snapshot_rx: watch::Receiver<Snapshot>,
    slot: TurnSlot,
    next_turn: Arc<AtomicU64>,
}

impl ChatSession {
    /// Start a session talking to the HTTP chat endpoint in `config`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(config: &ClientConfig) -> Result<Self, ConfigError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::spawn(transport, config.max_retries))
    }

    /// Start a session over any transport.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn<T: ChatTransport + 'static>(transport: T, max_retries: u32) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::default());
        let slot = TurnSlot::default();

        let runtime = SessionRuntime::new(transport, max_retries, command_rx, snapshot_tx, slot.clone());
        tokio::spawn(runtime.run());

        Self {
            command_tx,
            snapshot_rx,
            slot,
            next_turn: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Ask a question. Any turn still streaming is cancelled first.
    ///
    /// Returns as soon as the turn is scheduled.
    pub fn start_turn(&self, question: impl Into<String>) -> Result<TurnId, SessionError> {
        let turn = self.next_turn.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();

        // Hold the slot while sending so commands reach the runtime in slot order
        let mut slot = lock_slot(&self.slot);
        if let Some(previous) = slot.replace(ActiveTurn {
            id: turn,
            cancel: cancel.clone(),
        }) {
            previous.cancel.cancel();
        }
        self.command_tx
            .send(Command::StartTurn {
                turn,
                question: question.into(),
                cancel,
            })
            .map_err(|_| SessionError::Closed)?;

        Ok(turn)
    }

    /// Stop the turn in flight, if any.
    ///
    /// The turn's stream is cancelled before this returns, so no frame that
    /// arrives afterwards is applied.
    pub fn cancel_turn(&self) -> Result<(), SessionError> {
        let mut slot = lock_slot(&self.slot);
        if let Some(active) = slot.take() {
            active.cancel.cancel();
        }
        self.command_tx
            .send(Command::Cancel)
            .map_err(|_| SessionError::Closed)
    }

    /// Drop the whole conversation, its session id and any open stream.
    pub fn reset_conversation(&self) -> Result<(), SessionError> {
        let mut slot = lock_slot(&self.slot);
        if let Some(active) = slot.take() {
            active.cancel.cancel();
        }
        self.command_tx
            .send(Command::Reset)
            .map_err(|_| SessionError::Closed)
    }

    /// Start a fresh search: reset, then ask `query`.
    pub fn search(&self, query: impl Into<String>) -> Result<TurnId, SessionError> {
        self.reset_conversation()?;
        self.start_turn(query)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_rx.clone()
    }

    /// Snapshots as they change, starting with the current one
    pub fn updates(&self) -> WatchStream<Snapshot> {
        WatchStream::new(self.snapshot_rx.clone())
    }

    /// Wait until `turn` (or a later one) has been picked up and is no
    /// longer streaming.
    pub async fn wait_for_turn(&self, turn: TurnId) -> Result<Snapshot, SessionError> {
        let mut rx = self.snapshot_rx.clone();
        let snapshot = rx
            .wait_for(|s| s.turn >= turn && !s.state.is_streaming())
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(snapshot.clone())
    }
}
