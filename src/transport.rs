//! Answer stream transport
//!
//! The HTTP/SSE connection to the chat endpoint, failure classification,
//! and the per-turn retry budget.

mod error;
mod http;
mod retry;

pub use error::{classify_error, ErrorClass, TransportError, TransportErrorKind};
pub use http::HttpTransport;
pub use retry::{RetryController, RetryCounter, RetryDecision, DEFAULT_MAX_RETRIES};
