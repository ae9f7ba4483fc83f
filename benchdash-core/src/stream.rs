//! Live metrics stream consumer.
//!
//! Maintains a single SSE subscription to the backend's incremental-metrics
//! endpoint and keeps a [`MetricsStore`] synchronized. The connection moves
//! through an explicit state machine:
//!
//! ```text
//! connecting -> open -> (closed | error) -> connecting (auto-retry)
//! ```
//!
//! Entering `open` raises the store's connected flag; any failure lowers it,
//! never clearing accumulated data, and the consumer re-enters `connecting`
//! after an exponential backoff. Teardown is scoped: the consumer owns its
//! transport for the lifetime of one `run` call and a cancellation token
//! closes it deterministically.

use crate::config::StreamConfig;
use crate::store::SharedStore;
use crate::types::StreamPayload;
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Connection lifecycle states for the metrics stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Error,
}

/// Long-lived consumer of the incremental-metrics SSE channel.
///
/// Exactly one consumer exists per mounted dashboard session.
pub struct StreamConsumer {
    client: Client,
    url: String,
    store: SharedStore,
    retry_initial: Duration,
    retry_max: Duration,
}

impl StreamConsumer {
    pub fn new(client: Client, url: String, store: SharedStore, config: &StreamConfig) -> Self {
        Self {
            client,
            url,
            store,
            retry_initial: Duration::from_millis(config.retry_initial_ms),
            retry_max: Duration::from_millis(config.retry_max_ms),
        }
    }

    /// Parse one SSE `data:` frame body.
    ///
    /// Returns `None` for anything that is not a well-formed payload;
    /// malformed frames are expected to be transient and are discarded
    /// without touching state or surfacing an error.
    pub fn parse_frame(data: &str) -> Option<StreamPayload> {
        serde_json::from_str(data).ok()
    }

    /// Parse and merge one frame body into the store.
    ///
    /// The whole update is applied under a single write guard, so readers
    /// never observe a half-merged frame. Returns whether the frame was
    /// applied.
    pub async fn apply_frame(store: &SharedStore, data: &str) -> bool {
        match Self::parse_frame(data) {
            Some(payload) => {
                let mut store = store.write().await;
                store.apply_stream_payload(payload);
                true
            }
            None => {
                debug!(frame_len = data.len(), "discarding malformed stream frame");
                false
            }
        }
    }

    /// Run the subscription until cancelled.
    ///
    /// Reconnects with exponential backoff on any connect or read failure.
    /// On return the transport is closed and the connected flag lowered.
    pub async fn run(self, cancel: CancellationToken) {
        let mut backoff = self.retry_initial;

        loop {
            debug!(url = self.url.as_str(), state = ?ConnectionState::Connecting, "metrics stream");

            let connect = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.client.get(&self.url).send() => result,
            };

            let response = match connect.and_then(|r| r.error_for_status()) {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, state = ?ConnectionState::Error, "metrics stream connect failed");
                    self.store.write().await.set_connected(false);
                    if !self.sleep_backoff(&cancel, &mut backoff).await {
                        break;
                    }
                    continue;
                }
            };

            debug!(state = ?ConnectionState::Open, "metrics stream");
            self.store.write().await.set_connected(true);
            backoff = self.retry_initial;

            let end_state = self.consume(response, &cancel).await;
            self.store.write().await.set_connected(false);

            match end_state {
                ConnectionState::Closed if cancel.is_cancelled() => break,
                state => {
                    debug!(state = ?state, "metrics stream disconnected");
                    if !self.sleep_backoff(&cancel, &mut backoff).await {
                        break;
                    }
                }
            }
        }

        self.store.write().await.set_connected(false);
        debug!("metrics stream consumer stopped");
    }

    /// Read SSE frames from an open response until it ends, fails, or the
    /// token fires. Returns the terminal state of this connection attempt.
    async fn consume(&self, response: reqwest::Response, cancel: &CancellationToken) -> ConnectionState {
        let mut byte_stream = response.bytes_stream();
        let mut line_buffer: Vec<u8> = Vec::new();

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return ConnectionState::Closed,
                chunk = byte_stream.next() => chunk,
            };

            let chunk = match chunk {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    warn!(error = %e, "metrics stream read failed");
                    return ConnectionState::Error;
                }
                // Server closed the stream.
                None => return ConnectionState::Closed,
            };

            line_buffer.extend_from_slice(&chunk);

            // Process complete lines from the buffer.
            while let Some(line) = Self::next_line(&mut line_buffer) {
                if let Some(data) = line.strip_prefix("data:") {
                    Self::apply_frame(&self.store, data.trim()).await;
                }
                // Blank separators, comments, and `event:` lines carry
                // nothing for this endpoint.
            }
        }
    }

    /// Pop one complete line off the byte buffer, or `None` if no newline
    /// has arrived yet. Decoding happens on whole lines only, so a
    /// multi-byte character split across transport chunks stays intact.
    fn next_line(buffer: &mut Vec<u8>) -> Option<String> {
        let newline_pos = buffer.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = buffer.drain(..=newline_pos).collect();
        Some(String::from_utf8_lossy(&line[..newline_pos]).trim().to_string())
    }

    /// Sleep out the current backoff, doubling it up to the ceiling.
    /// Returns `false` if cancelled while waiting.
    async fn sleep_backoff(&self, cancel: &CancellationToken, backoff: &mut Duration) -> bool {
        debug!(delay_ms = backoff.as_millis() as u64, "metrics stream retry backoff");
        let finished = tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(*backoff) => true,
        };
        *backoff = (*backoff * 2).min(self.retry_max);
        finished
    }
}
