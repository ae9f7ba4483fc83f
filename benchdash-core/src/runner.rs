//! Sequential benchmark orchestrator.
//!
//! Drives one user-triggered benchmark run: a single prompt issued against an
//! ordered set of optimization modes, strictly one inference request in
//! flight at a time. The backend inference resource is a shared accelerator,
//! so sequencing is enforced by construction (one task awaiting one request)
//! rather than by external locking; concurrent requests would invalidate the
//! latency and memory comparisons.
//!
//! Results publish incrementally: each success is visible through the shared
//! run state before the next mode starts, and a failure halts the run while
//! retaining everything collected so far.

use crate::api::BenchApi;
use crate::error::ApiError;
use crate::types::{InferenceRequest, InferenceResult, ModelSize, OptimizationMode};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Lifecycle of a benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Error,
}

/// Observable state of the current (or most recent) benchmark run.
///
/// `results` is always a strict prefix of the requested mode list: no gaps,
/// no reordering. At most one run is in flight per session; starting a new
/// run discards the previous run's results.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkRun {
    pub status: RunStatus,
    pub current_mode: Option<OptimizationMode>,
    pub results: Vec<InferenceResult>,
    pub error: Option<String>,
    /// Monotonic run identifier. A response that arrives for an older
    /// generation (after a reset or a newer run) is detected and ignored.
    pub generation: u64,
}

/// Shared handle to the run state.
pub type SharedRun = Arc<RwLock<BenchmarkRun>>;

/// Orchestrates sequential multi-mode benchmark runs against a backend.
pub struct BenchmarkRunner {
    api: Arc<dyn BenchApi>,
    run: SharedRun,
}

impl BenchmarkRunner {
    pub fn new(api: Arc<dyn BenchApi>) -> Self {
        Self {
            api,
            run: Arc::new(RwLock::new(BenchmarkRun::default())),
        }
    }

    /// Shared run state, for progress display while a run is in flight.
    pub fn run_state(&self) -> SharedRun {
        Arc::clone(&self.run)
    }

    /// Snapshot of the current run state.
    pub async fn state(&self) -> BenchmarkRun {
        self.run.read().await.clone()
    }

    /// Execute one benchmark run: the prompt against each mode in order.
    ///
    /// Preconditions (non-empty trimmed text, non-empty modes) are the
    /// caller layer's guard; the orchestrator assumes they hold.
    ///
    /// Modes are processed strictly sequentially. `current_mode` is set
    /// before each request; each success is appended to `results`
    /// immediately. The first failure moves the run to `Error` with a
    /// message naming the failing mode, attempts no further modes, and
    /// retains the results collected so far. After the last mode succeeds
    /// the run returns to `Idle` with `current_mode` cleared.
    pub async fn run(
        &self,
        text: &str,
        modes: &[OptimizationMode],
        model_size: ModelSize,
        max_new_tokens: u32,
    ) {
        let generation = {
            let mut run = self.run.write().await;
            run.generation += 1;
            run.status = RunStatus::Running;
            run.current_mode = None;
            run.results.clear();
            run.error = None;
            run.generation
        };

        info!(modes = modes.len(), generation, "benchmark run started");

        for mode in modes {
            {
                let mut run = self.run.write().await;
                if run.generation != generation {
                    debug!(generation, "benchmark run superseded, stopping");
                    return;
                }
                run.current_mode = Some(*mode);
            }

            let request = InferenceRequest {
                text: text.to_string(),
                optimization_mode: *mode,
                model_size,
                max_new_tokens,
            };

            let outcome = self.api.run_inference(&request).await;

            let mut run = self.run.write().await;
            if run.generation != generation {
                // A reset (or newer run) happened while this request was in
                // flight; the late response belongs to an abandoned run.
                debug!(generation, mode = mode.as_str(), "ignoring late response for stale run");
                return;
            }

            match outcome {
                Ok(result) => {
                    debug!(
                        mode = mode.as_str(),
                        latency_ms = result.latency_ms,
                        "benchmark step complete"
                    );
                    run.results.push(result);
                }
                Err(e) => {
                    let message = Self::step_failure_message(*mode, &e);
                    warn!(mode = mode.as_str(), error = %e, "benchmark run aborted");
                    run.status = RunStatus::Error;
                    run.current_mode = None;
                    run.error = Some(message);
                    return;
                }
            }
        }

        let mut run = self.run.write().await;
        if run.generation != generation {
            return;
        }
        run.status = RunStatus::Idle;
        run.current_mode = None;
        info!(results = run.results.len(), "benchmark run complete");
    }

    /// Clear results, error, and progress, returning the run to `Idle`.
    ///
    /// Does not abort an in-flight request; bumping the generation instead
    /// guarantees its late response is ignored when it lands.
    pub async fn reset(&self) {
        let mut run = self.run.write().await;
        run.generation += 1;
        run.status = RunStatus::Idle;
        run.current_mode = None;
        run.results.clear();
        run.error = None;
        debug!(generation = run.generation, "benchmark run reset");
    }

    fn step_failure_message(mode: OptimizationMode, error: &ApiError) -> String {
        format!("benchmark failed at mode '{}': {}", mode, error)
    }
}
