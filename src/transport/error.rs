//! Transport error types

use std::time::Duration;
use thiserror::Error;

/// Transport failure with classification inputs
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    /// HTTP status of a rejected open, if one was received
    pub status: Option<u16>,
    pub message: String,
    /// Server-suggested delay before reconnecting
    pub retry_after: Option<Duration>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    /// Non-2xx response when opening the stream
    pub fn status(status: u16, body: &str) -> Self {
        let message = if body.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {}", body.trim())
        };
        Self {
            status: Some(status),
            ..Self::new(TransportErrorKind::Status, message)
        }
    }

    /// Failure while reading an already open body
    pub fn stream(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Stream, message)
    }

    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return Self::status(status.as_u16(), "");
        }
        if e.is_timeout() {
            Self::network(format!("Request timeout: {e}"))
        } else if e.is_connect() {
            Self::network(format!("Connection failed: {e}"))
        } else if e.is_body() || e.is_decode() {
            Self::stream(format!("Failed to read response: {e}"))
        } else {
            Self::network(format!("Request failed: {e}"))
        }
    }

    pub fn class(&self) -> ErrorClass {
        classify_error(self.status)
    }
}

/// Where a transport failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connect, DNS, timeout
    Network,
    /// Server answered the open with a non-2xx status
    Status,
    /// Body broke off mid-stream
    Stream,
}

/// Whether a failure ends the turn or is absorbed by the retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Fatal,
    Retriable,
}

impl ErrorClass {
    pub fn is_retriable(self) -> bool {
        matches!(self, ErrorClass::Retriable)
    }
}

/// Client errors other than 429 will not succeed on a retry. Everything
/// else (5xx, 429, failures with no status) might.
pub fn classify_error(status: Option<u16>) -> ErrorClass {
    match status {
        Some(429) => ErrorClass::Retriable,
        Some(400..=499) => ErrorClass::Fatal,
        _ => ErrorClass::Retriable,
    }
}
