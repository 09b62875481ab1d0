//! Session runtime executor

use super::session::{lock_slot, ActiveTurn, Snapshot, TurnId, TurnSlot};
use super::traits::{ChatRequest, ChatTransport};
use crate::protocol::{decode, RawFrame};
use crate::state_machine::{transition, Conversation, Effect, Event};
use crate::transport::{RetryController, RetryDecision};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

const INPUT_CHANNEL_CAPACITY: usize = 64;

/// Requests from [`super::ChatSession`] handles
#[derive(Debug)]
pub(crate) enum Command {
    StartTurn {
        turn: TurnId,
        question: String,
        cancel: CancellationToken,
    },
    Cancel,
    Reset,
}

/// Stream input forwarded by a turn's reader task
#[derive(Debug)]
pub(crate) struct TurnInput {
    turn: TurnId,
    kind: InputKind,
}

#[derive(Debug)]
enum InputKind {
    Frame(RawFrame),
    Failed(String),
    Closed,
}

/// Owns the conversation and serializes commands and stream input on one loop
pub(crate) struct SessionRuntime<T: ChatTransport + 'static> {
    conversation: Conversation,
    transport: Arc<T>,
    max_retries: u32,
    command_rx: mpsc::UnboundedReceiver<Command>,
    input_tx: mpsc::Sender<TurnInput>,
    input_rx: mpsc::Receiver<TurnInput>,
    snapshot_tx: watch::Sender<Snapshot>,
    /// Turn shared with handles so they can cancel without a round trip
    slot: TurnSlot,
    /// Turn whose reader task is allowed to feed the conversation
    active: Option<ActiveTurn>,
    turn: TurnId,
}

impl<T: ChatTransport + 'static> SessionRuntime<T> {
    pub(crate) fn new(
        transport: T,
        max_retries: u32,
        command_rx: mpsc::UnboundedReceiver<Command>,
        snapshot_tx: watch::Sender<Snapshot>,
        slot: TurnSlot,
    ) -> Self {
        let (input_tx, input_rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        Self {
            conversation: Conversation::new(),
            transport: Arc::new(transport),
            max_retries,
            command_rx,
            input_tx,
            input_rx,
            snapshot_tx,
            slot,
            active: None,
            turn: 0,
        }
    }

    /// Run until every handle has been dropped.
    pub(crate) async fn run(mut self) {
        tracing::info!(max_retries = self.max_retries, "Starting session runtime");

        loop {
            tokio::select! {
                biased;

                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },

                Some(input) = self.input_rx.recv() => self.handle_input(input),
            }
            self.publish();
        }

        self.abort_active();
        tracing::info!("Session runtime stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartTurn {
                turn,
                question,
                cancel,
            } => {
                if self.conversation.state().is_streaming() {
                    tracing::info!(turn = self.turn, next = turn, "Superseding in-flight turn");
                    self.apply(Event::UserCancel);
                }
                self.turn = turn;
                self.active = Some(ActiveTurn { id: turn, cancel });
                tracing::info!(turn, "Starting turn");
                self.apply(Event::UserQuestion { text: question });
            }
            Command::Cancel => {
                tracing::info!(turn = self.turn, "Cancelling turn");
                self.apply(Event::UserCancel);
            }
            Command::Reset => {
                tracing::info!("Resetting conversation");
                self.apply(Event::Reset);
            }
        }
    }

    fn handle_input(&mut self, input: TurnInput) {
        let live = self
            .active
            .as_ref()
            .is_some_and(|active| active.id == input.turn && !active.cancel.is_cancelled());
        if !live {
            tracing::trace!(turn = input.turn, "Dropping input from a stopped turn");
            return;
        }

        let event = match input.kind {
            InputKind::Frame(frame) => {
                let token = decode(&frame);
                tracing::debug!(turn = input.turn, kind = token.kind(), "Stream token");
                Event::Token(token)
            }
            InputKind::Failed(message) => Event::TransportFailed { message },
            InputKind::Closed => Event::StreamClosed,
        };
        self.apply(event);
    }

    fn apply(&mut self, event: Event) {
        match transition(&mut self.conversation, event) {
            Ok(result) => {
                for effect in result.effects {
                    self.execute_effect(effect);
                }
            }
            Err(e) => {
                tracing::warn!(turn = self.turn, error = %e, "Rejected event");
            }
        }
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::OpenTransport {
                question,
                session_id,
            } => {
                let Some(active) = self.active.clone() else {
                    tracing::warn!(turn = self.turn, "No active turn to open a stream for");
                    return;
                };
                let reader = TurnReader {
                    turn: active.id,
                    request: ChatRequest::new(question, session_id),
                    cancel: active.cancel,
                    retry: RetryController::new(self.max_retries),
                    input_tx: self.input_tx.clone(),
                };
                let transport = self.transport.clone();
                tokio::spawn(async move { reader.run(&*transport).await });
            }
            Effect::AbortTransport => self.abort_active(),
        }
    }

    fn abort_active(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        active.cancel.cancel();

        let mut slot = lock_slot(&self.slot);
        if slot.as_ref().is_some_and(|current| current.id == active.id) {
            *slot = None;
        }
    }

    fn publish(&self) {
        let next = Snapshot {
            turn: self.turn,
            state: self.conversation.state().clone(),
            messages: self.conversation.messages().to_vec(),
            session_id: self.conversation.session_id().map(String::from),
        };
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

/// Pulls one turn's frames from the transport and forwards them to the runtime
struct TurnReader {
    turn: TurnId,
    request: ChatRequest,
    cancel: CancellationToken,
    retry: RetryController,
    input_tx: mpsc::Sender<TurnInput>,
}

impl TurnReader {
    async fn run<T: ChatTransport + ?Sized>(mut self, transport: &T) {
        let mut stream = transport.open(&self.request, self.cancel.clone()).await;

        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    tracing::debug!(turn = self.turn, "Reader stopped by cancellation");
                    return;
                }
                next = stream.next() => next,
            };

            let kind = match next {
                Some(Ok(frame)) => InputKind::Frame(frame),
                Some(Err(error)) => match self.retry.on_error(&error) {
                    RetryDecision::Continue { .. } => continue,
                    RetryDecision::Abort { reason } => {
                        self.forward(InputKind::Failed(reason)).await;
                        return;
                    }
                },
                None => {
                    self.forward(InputKind::Closed).await;
                    return;
                }
            };

            if !self.forward(kind).await {
                return;
            }
        }
    }

    async fn forward(&self, kind: InputKind) -> bool {
        let input = TurnInput {
            turn: self.turn,
            kind,
        };
        self.input_tx.send(input).await.is_ok()
    }
}
