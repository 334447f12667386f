//! Long-lived push subscription.
//!
//! Mirrors EventSource semantics: reconnect after the server-assigned `retry`
//! interval when the connection drops or the stream ends, resend the last
//! event id, and give up only when the server answers with something that is
//! not a `200 text/event-stream` response.

use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::StreamError;
use crate::sse::{SseEvent, SseParser};

/// Reconnection delay used until the server sends `retry:`.
pub const DEFAULT_RETRY: Duration = Duration::from_millis(3000);

const EVENT_STREAM: &str = "text/event-stream";
const LAST_EVENT_ID: &str = "Last-Event-ID";

enum StreamEnd {
    /// The server closed the body; reconnect.
    Closed,
    /// Nobody is consuming events anymore; stop.
    ReceiverGone,
}

pub struct StreamListener {
    client: reqwest::Client,
    url: String,
    parser: SseParser,
    retry: Duration,
    last_event_id: Option<String>,
}

impl StreamListener {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            parser: SseParser::new(),
            retry: DEFAULT_RETRY,
            last_event_id: None,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Initial reconnection delay; a `retry:` field from the server overrides it.
    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = retry;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn retry(&self) -> Duration {
        self.retry
    }

    /// Stream events into `tx` until cancelled, until the receiver is dropped,
    /// or until the subscription fails permanently.
    pub async fn run(
        mut self,
        tx: mpsc::Sender<SseEvent>,
        cancel: CancellationToken,
    ) -> Result<(), StreamError> {
        loop {
            let attempt = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                result = self.connect_and_read(&tx) => result,
            };
            match attempt {
                Ok(StreamEnd::ReceiverGone) => return Ok(()),
                Ok(StreamEnd::Closed) => {
                    debug!(url = %self.url, "event stream ended; reconnecting")
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(
                    url = %self.url,
                    error = %e,
                    retry_ms = self.retry.as_millis() as u64,
                    "event stream connection failed; reconnecting"
                ),
            }
            self.parser.reset();
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.retry) => {}
            }
        }
    }

    async fn connect_and_read(
        &mut self,
        tx: &mpsc::Sender<SseEvent>,
    ) -> Result<StreamEnd, StreamError> {
        let mut request = self
            .client
            .get(&self.url)
            .header(ACCEPT, EVENT_STREAM)
            .header(CACHE_CONTROL, "no-cache");
        if let Some(id) = self.last_event_id.as_deref().filter(|id| !id.is_empty()) {
            request = request.header(LAST_EVENT_ID, id);
        }

        let response = request.send().await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(StreamError::BadStatus(response.status()));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.starts_with(EVENT_STREAM) {
            return Err(StreamError::BadContentType(content_type));
        }
        info!(url = %self.url, "subscribed to event stream");

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            let events = self.parser.feed(&chunk);
            if let Some(retry) = self.parser.retry() {
                self.retry = retry;
            }
            self.last_event_id = self.parser.last_event_id().map(str::to_string);
            for event in events {
                if tx.send(event).await.is_err() {
                    return Ok(StreamEnd::ReceiverGone);
                }
            }
        }
        Ok(StreamEnd::Closed)
    }
}
