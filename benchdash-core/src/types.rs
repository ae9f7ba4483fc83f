//! Wire types shared between the backend API and the dashboard state.
//!
//! All aggregate statistics are computed server-side; the client treats them
//! as opaque immutable values to display and compare, never recomputing them
//! from raw samples. Parsing is deliberately tolerant: a mode with no data
//! arrives as a summary with `count: 0` and empty stats objects, and the
//! comparison table may be absent or carry a server-side error marker, so
//! every stats field defaults rather than failing the whole payload.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A named optimization strategy the backend can serve inference under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationMode {
    Baseline,
    Quantized,
    Torchscript,
    Onnx,
    Batched,
}

impl OptimizationMode {
    /// All modes in the backend's canonical benchmark order.
    pub const ALL: [OptimizationMode; 5] = [
        OptimizationMode::Baseline,
        OptimizationMode::Quantized,
        OptimizationMode::Torchscript,
        OptimizationMode::Onnx,
        OptimizationMode::Batched,
    ];

    /// The wire name of this mode (`baseline`, `quantized`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationMode::Baseline => "baseline",
            OptimizationMode::Quantized => "quantized",
            OptimizationMode::Torchscript => "torchscript",
            OptimizationMode::Onnx => "onnx",
            OptimizationMode::Batched => "batched",
        }
    }
}

impl fmt::Display for OptimizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // pad() honors width flags so modes line up in tables.
        f.pad(self.as_str())
    }
}

impl FromStr for OptimizationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "baseline" => Ok(OptimizationMode::Baseline),
            "quantized" => Ok(OptimizationMode::Quantized),
            "torchscript" => Ok(OptimizationMode::Torchscript),
            "onnx" => Ok(OptimizationMode::Onnx),
            "batched" => Ok(OptimizationMode::Batched),
            other => Err(format!(
                "unknown optimization mode '{}' (expected one of: baseline, quantized, torchscript, onnx, batched)",
                other
            )),
        }
    }
}

/// Model size selector. Wire values are the underlying model names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSize {
    #[serde(rename = "gpt2")]
    Small,
    #[serde(rename = "gpt2-medium")]
    Medium,
}

impl ModelSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSize::Small => "gpt2",
            ModelSize::Medium => "gpt2-medium",
        }
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ModelSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" | "gpt2" => Ok(ModelSize::Small),
            "medium" | "gpt2-medium" => Ok(ModelSize::Medium),
            other => Err(format!(
                "unknown model size '{}' (expected: small, medium)",
                other
            )),
        }
    }
}

/// One raw per-request performance measurement as streamed by the backend.
///
/// Immutable once produced; identified by arrival order, not by an id.
/// The mode is kept as a string so a frame carrying a mode this client
/// does not know about still parses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentMetric {
    pub mode: String,
    pub latency_ms: f64,
    pub tokens_per_sec: f64,
    pub memory_mb: f64,
    pub tokens_generated: u64,
    pub timestamp: f64,
}

/// Server-side latency aggregate for one mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    #[serde(default)]
    pub mean: f64,
    #[serde(default)]
    pub p50: f64,
    #[serde(default)]
    pub p95: f64,
    #[serde(default)]
    pub p99: f64,
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
}

/// Server-side throughput aggregate for one mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThroughputStats {
    #[serde(default)]
    pub mean_tokens_per_sec: f64,
    #[serde(default)]
    pub max_tokens_per_sec: f64,
    #[serde(default)]
    pub requests_per_sec: f64,
}

/// Server-side memory aggregate for one mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    #[serde(default)]
    pub mean_mb: f64,
    #[serde(default)]
    pub peak_mb: f64,
}

/// Aggregate statistics for one optimization mode.
///
/// A summary with `count == 0` has no meaningful statistics and is excluded
/// from ranking and display logic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeSummary {
    pub mode: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub latency: LatencyStats,
    #[serde(default)]
    pub throughput: ThroughputStats,
    #[serde(default)]
    pub memory: MemoryStats,
}

/// A `ModeSummary` extended with cross-mode comparison fields.
///
/// `speedup` is the ratio of baseline mean latency to this mode's mean
/// latency as computed by the backend; it is absent when no baseline data
/// exists. `estimated_cost_per_1m_tokens` may be non-finite on the wire
/// (`Infinity` for zero throughput), which JSON cannot carry, so both are
/// options and formatting decides how to render their absence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonEntry {
    #[serde(flatten)]
    pub summary: ModeSummary,
    #[serde(default)]
    pub speedup: Option<f64>,
    #[serde(default)]
    pub estimated_cost_per_1m_tokens: Option<f64>,
}

/// The full aggregate metrics state as of one backend computation.
///
/// Always replaced wholesale, never merged field-by-field, so `summaries`
/// and `comparison` are guaranteed to come from the same computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(default)]
    pub summaries: BTreeMap<String, ModeSummary>,
    #[serde(default, deserialize_with = "de_comparison")]
    pub comparison: BTreeMap<String, ComparisonEntry>,
    #[serde(default)]
    pub total_inferences: u64,
}

/// The comparison report degrades to `{"error": "..."}` when the backend has
/// no baseline data yet. Treat anything that is not a valid entry map as an
/// empty table rather than failing the snapshot.
fn de_comparison<'de, D>(de: D) -> Result<BTreeMap<String, ComparisonEntry>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(de)?;
    let mut table = BTreeMap::new();
    if let serde_json::Value::Object(map) = value {
        for (mode, entry) in map {
            if let Ok(entry) = serde_json::from_value::<ComparisonEntry>(entry) {
                table.insert(mode, entry);
            }
        }
    }
    Ok(table)
}

/// One SSE frame body from the incremental-metrics stream.
///
/// Deliberately narrower than [`MetricsSnapshot`]: the comparison table is
/// not part of the stream payload and only refreshes on an explicit
/// snapshot fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamPayload {
    #[serde(default)]
    pub recent: Vec<RecentMetric>,
    #[serde(default)]
    pub summaries: BTreeMap<String, ModeSummary>,
    #[serde(default)]
    pub total: u64,
}

/// A single inference request submitted to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub text: String,
    pub optimization_mode: OptimizationMode,
    pub model_size: ModelSize,
    pub max_new_tokens: u32,
}

/// The backend's response to a single inference request.
///
/// A result exists only for modes that completed successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub result: String,
    pub latency_ms: f64,
    pub tokens_per_sec: f64,
    pub tokens_generated: u64,
    pub memory_mb: f64,
    pub optimization_mode: OptimizationMode,
    pub model_size: ModelSize,
}

/// One persisted measurement row from the backend's metrics history.
///
/// Unlike [`RecentMetric`] these carry a storage id and use the backend's
/// `optimization_mode` column name. The mode stays a string for the same
/// tolerance reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: u64,
    pub optimization_mode: String,
    pub latency_ms: f64,
    pub tokens_per_sec: f64,
    pub memory_mb: f64,
    pub tokens_generated: u64,
    pub timestamp: f64,
}

/// One page of persisted history, newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    #[serde(default)]
    pub history: Vec<HistoryRecord>,
    #[serde(default)]
    pub total_stored: u64,
}

/// Backend health report (read-only status source, not polled by the core).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub loaded_servers: Vec<String>,
    #[serde(default)]
    pub timestamp: f64,
}
