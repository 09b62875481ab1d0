//! HTTP/SSE transport for the chat endpoint
//!
//! `POST {api_host}/chat[?session_id=..]` with `{"question": ..}` and reads
//! the `text/event-stream` body. After a failure the stream reconnects with
//! the same request, but only if the caller polls it again.

use super::error::TransportError;
use crate::config::{ClientConfig, ConfigError};
use crate::protocol::RawFrame;
use crate::runtime::{ChatRequest, ChatTransport, FrameStream};
use async_trait::async_trait;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// SSE event type used for frames sent without an `event:` line
const DEFAULT_EVENT_TYPE: &str = "message";

type SseEvents = BoxStream<'static, Result<eventsource_stream::Event, EventStreamError<reqwest::Error>>>;

/// Production [`ChatTransport`] over reqwest.
///
/// A reconnect re-POSTs the question, so text the server replays after a
/// mid-body failure is appended to the answer again.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    retry_interval: Duration,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Self::with_client(client, config)
    }

    pub fn with_client(client: Client, config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            client,
            endpoint: config.chat_endpoint()?,
            retry_interval: config.retry_interval,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn url_for(&self, request: &ChatRequest) -> Url {
        let mut url = self.endpoint.clone();
        if let Some(session_id) = &request.session_id {
            url.query_pairs_mut().append_pair("session_id", session_id);
        }
        url
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open(&self, request: &ChatRequest, cancel: CancellationToken) -> FrameStream {
        let connection = Connection {
            client: self.client.clone(),
            url: self.url_for(request),
            request: request.clone(),
            retry_interval: self.retry_interval,
            cancel,
            phase: Phase::Connect { backoff: None },
        };
        futures::stream::unfold(connection, Connection::next).boxed()
    }
}

enum Phase {
    Connect { backoff: Option<Duration> },
    Reading(SseEvents),
    Finished,
}

/// State carried between polls of one turn's frame stream
struct Connection {
    client: Client,
    url: Url,
    request: ChatRequest,
    retry_interval: Duration,
    cancel: CancellationToken,
    phase: Phase,
}

impl Connection {
    async fn next(mut self) -> Option<(Result<RawFrame, TransportError>, Self)> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Finished) {
                Phase::Finished => return None,

                Phase::Connect { backoff } => {
                    if let Some(delay) = backoff {
                        tracing::debug!(delay_ms = %delay.as_millis(), "Reconnecting answer stream");
                        tokio::select! {
                            biased;
                            () = self.cancel.cancelled() => return None,
                            () = tokio::time::sleep(delay) => {}
                        }
                    }

                    let opened = tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => return None,
                        opened = connect(&self.client, &self.url, &self.request) => opened,
                    };

                    match opened {
                        Ok(events) => self.phase = Phase::Reading(events),
                        Err(e) => {
                            let delay = e.retry_after.unwrap_or(self.retry_interval);
                            self.phase = Phase::Connect {
                                backoff: Some(delay),
                            };
                            return Some((Err(e), self));
                        }
                    }
                }

                Phase::Reading(mut events) => {
                    let next = tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => return None,
                        next = events.next() => next,
                    };

                    match next {
                        Some(Ok(event)) => {
                            if let Some(retry) = event.retry {
                                self.retry_interval = retry;
                            }
                            self.phase = Phase::Reading(events);
                            return Some((Ok(to_frame(event)), self));
                        }
                        Some(Err(e)) => {
                            self.phase = Phase::Connect {
                                backoff: Some(self.retry_interval),
                            };
                            return Some((Err(stream_error(e)), self));
                        }
                        None => {
                            tracing::debug!("Answer stream body ended");
                            return None;
                        }
                    }
                }
            }
        }
    }
}

async fn connect(
    client: &Client,
    url: &Url,
    request: &ChatRequest,
) -> Result<SseEvents, TransportError> {
    tracing::info!(
        url = %url,
        has_session = request.session_id.is_some(),
        "Opening answer stream"
    );

    let response = client
        .post(url.clone())
        .header(ACCEPT, "text/event-stream")
        .json(request)
        .send()
        .await
        .map_err(|e| TransportError::from_reqwest(&e))?;

    let status = response.status();
    if !status.is_success() {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();
        let error = TransportError::status(status.as_u16(), &body);
        return Err(match retry_after {
            Some(delay) => error.with_retry_after(delay),
            None => error,
        });
    }

    Ok(response.bytes_stream().eventsource().boxed())
}

fn to_frame(event: eventsource_stream::Event) -> RawFrame {
    let name = (!event.event.is_empty() && event.event != DEFAULT_EVENT_TYPE).then_some(event.event);
    RawFrame {
        event: name,
        data: event.data,
    }
}

fn stream_error(e: EventStreamError<reqwest::Error>) -> TransportError {
    match e {
        EventStreamError::Transport(inner) => TransportError::from_reqwest(&inner),
        other => TransportError::stream(format!("Malformed event stream: {other}")),
    }
}
