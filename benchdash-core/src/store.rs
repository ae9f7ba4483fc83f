//! In-memory dashboard state.
//!
//! [`MetricsStore`] is a pure state container: the snapshot fetcher and the
//! stream consumer write into it, the rendering layer reads from it. It has
//! no business logic beyond the replace/append/truncate rules, and any
//! number of independent stores can exist (one per dashboard session).
//!
//! Mutation happens through accessor methods behind a single `RwLock` write
//! guard, so each handled event applies fully before any reader observes it.

use crate::api::BenchApi;
use crate::types::{MetricsSnapshot, RecentMetric, StreamPayload};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Maximum number of raw samples retained in the recent window.
pub const RECENT_WINDOW_CAP: usize = 200;

/// Shared handle to a [`MetricsStore`].
pub type SharedStore = Arc<RwLock<MetricsStore>>;

/// Aggregated dashboard state for one session.
#[derive(Debug, Default)]
pub struct MetricsStore {
    snapshot: MetricsSnapshot,
    recent: VecDeque<RecentMetric>,
    connected: bool,
    last_error: Option<String>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store wrapped for shared access.
    pub fn shared() -> SharedStore {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Replace the full aggregate snapshot.
    ///
    /// Summaries, comparison, and total are replaced together so they always
    /// reflect a single backend computation. Clears any recorded fetch error.
    pub fn apply_snapshot(&mut self, snapshot: MetricsSnapshot) {
        self.snapshot = snapshot;
        self.last_error = None;
    }

    /// Merge one stream frame.
    ///
    /// Replaces summaries and the inference total wholesale and appends the
    /// freshly streamed samples to the recent window, evicting from the front
    /// once the window exceeds its capacity. The comparison table is *not*
    /// part of the stream payload and is left untouched until the next
    /// snapshot fetch.
    pub fn apply_stream_payload(&mut self, payload: StreamPayload) {
        self.snapshot.summaries = payload.summaries;
        self.snapshot.total_inferences = payload.total;

        self.recent.extend(payload.recent);
        while self.recent.len() > RECENT_WINDOW_CAP {
            self.recent.pop_front();
        }
    }

    /// Record a fetch failure without disturbing the current snapshot.
    /// Stale-but-valid data beats a blank dashboard.
    pub fn record_fetch_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// Update the stream connection flag. Never touches accumulated data.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn snapshot(&self) -> &MetricsSnapshot {
        &self.snapshot
    }

    /// The bounded recent-sample window, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &RecentMetric> {
        self.recent.iter()
    }

    pub fn recent_len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

/// Fetch the full aggregate state and replace the store's snapshot.
///
/// On success the snapshot (summaries, comparison, and total together) is
/// replaced and any previous fetch error cleared. On failure a human-readable
/// message is recorded and the previous snapshot is left untouched. Safe to
/// invoke repeatedly; never returns an error across the store boundary.
pub async fn refresh_snapshot(api: &dyn BenchApi, store: &SharedStore) {
    match api.fetch_metrics().await {
        Ok(snapshot) => {
            debug!(
                total_inferences = snapshot.total_inferences,
                modes = snapshot.summaries.len(),
                "snapshot refreshed"
            );
            store.write().await.apply_snapshot(snapshot);
        }
        Err(e) => {
            let message = format!("metrics fetch failed: {}", e);
            debug!(error = message.as_str(), "snapshot refresh failed");
            store.write().await.record_fetch_error(message);
        }
    }
}
