//! # Benchdash Core
//!
//! Client core for the Benchdash live benchmarking dashboard.
//! Consumes the backend's metrics snapshot and SSE stream into a bounded
//! in-memory store, and orchestrates sequential multi-mode benchmark runs
//! against the inference API.

pub mod api;
pub mod config;
pub mod error;
pub mod report;
pub mod runner;
pub mod store;
pub mod stream;
pub mod types;

// Re-export commonly used types at the crate root.
pub use api::{BenchApi, HttpBenchApi, MockBenchApi};
pub use config::{load_config, DashboardConfig};
pub use error::{ApiError, ConfigError};
pub use runner::{BenchmarkRun, BenchmarkRunner, RunStatus};
pub use store::{refresh_snapshot, MetricsStore, SharedStore, RECENT_WINDOW_CAP};
pub use stream::{ConnectionState, StreamConsumer};
pub use types::{
    ComparisonEntry, HealthStatus, HistoryPage, HistoryRecord, InferenceRequest, InferenceResult,
    MetricsSnapshot, ModelSize, ModeSummary, OptimizationMode, RecentMetric, StreamPayload,
};
