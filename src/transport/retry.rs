//! Per-turn retry budget

use super::error::{ErrorClass, TransportError};

/// Retriable failures tolerated per turn; the next one ends the turn
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Retriable failures seen in the current turn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryCounter {
    pub count: u32,
}

/// What to do with the stream after a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Keep polling; the transport reconnects on its own
    Continue { attempt: u32 },
    /// Drop the stream and fail the turn
    Abort { reason: String },
}

/// Decides, failure by failure, whether a turn's stream may keep going.
///
/// Never re-issues a request itself. One controller lives for exactly one
/// turn, so the counter starts at zero for every turn.
#[derive(Debug, Clone)]
pub struct RetryController {
    counter: RetryCounter,
    max_retries: u32,
}

impl RetryController {
    pub fn new(max_retries: u32) -> Self {
        Self {
            counter: RetryCounter::default(),
            max_retries,
        }
    }

    pub fn counter(&self) -> RetryCounter {
        self.counter
    }

    pub fn on_error(&mut self, error: &TransportError) -> RetryDecision {
        match error.class() {
            ErrorClass::Fatal => {
                tracing::error!(
                    status = ?error.status,
                    error = %error.message,
                    "Fatal transport error"
                );
                RetryDecision::Abort {
                    reason: error.message.clone(),
                }
            }
            ErrorClass::Retriable => {
                self.counter.count += 1;
                let attempt = self.counter.count;
                if attempt > self.max_retries {
                    tracing::error!(
                        attempt,
                        max_retries = self.max_retries,
                        error = %error.message,
                        "Retry budget exhausted"
                    );
                    RetryDecision::Abort {
                        reason: format!("Failed after {attempt} attempts: {}", error.message),
                    }
                } else {
                    tracing::warn!(
                        attempt,
                        max_retries = self.max_retries,
                        error = %error.message,
                        "Retriable transport error, letting the stream reconnect"
                    );
                    RetryDecision::Continue { attempt }
                }
            }
        }
    }
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}
