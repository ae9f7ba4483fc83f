//! Integration tests for the dashboard client core.
//!
//! These exercise the store, stream consumer, and benchmark orchestrator
//! together against `MockBenchApi`, verifying the ordering and visibility
//! guarantees the rendering layer depends on.

use async_trait::async_trait;
use benchdash_core::api::{BenchApi, MockBenchApi};
use benchdash_core::error::ApiError;
use benchdash_core::runner::{BenchmarkRunner, RunStatus, SharedRun};
use benchdash_core::store::{refresh_snapshot, MetricsStore};
use benchdash_core::stream::StreamConsumer;
use benchdash_core::types::{
    HealthStatus, HistoryPage, InferenceRequest, InferenceResult, MetricsSnapshot, ModeSummary,
    ModelSize, OptimizationMode,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Wraps `MockBenchApi` and records what the shared run state looked like at
/// the moment each inference request arrived. Because the orchestrator sets
/// `current_mode` and publishes results before issuing the next request,
/// this observes the mid-run state transitions without racing the run task.
struct ObservingApi {
    inner: MockBenchApi,
    run: Mutex<Option<SharedRun>>,
    observed: Mutex<Vec<(Option<OptimizationMode>, usize)>>,
}

impl ObservingApi {
    fn new(inner: MockBenchApi) -> Self {
        Self {
            inner,
            run: Mutex::new(None),
            observed: Mutex::new(Vec::new()),
        }
    }

    fn attach(&self, run: SharedRun) {
        *self.run.lock().unwrap() = Some(run);
    }

    fn observed(&self) -> Vec<(Option<OptimizationMode>, usize)> {
        self.observed.lock().unwrap().clone()
    }
}

#[async_trait]
impl BenchApi for ObservingApi {
    async fn fetch_metrics(&self) -> Result<MetricsSnapshot, ApiError> {
        self.inner.fetch_metrics().await
    }

    async fn run_inference(&self, request: &InferenceRequest) -> Result<InferenceResult, ApiError> {
        let run = self.run.lock().unwrap().clone();
        if let Some(run) = run {
            let state = run.read().await;
            self.observed
                .lock()
                .unwrap()
                .push((state.current_mode, state.results.len()));
        }
        self.inner.run_inference(request).await
    }

    async fn history(
        &self,
        mode: Option<OptimizationMode>,
        limit: u32,
    ) -> Result<HistoryPage, ApiError> {
        self.inner.history(mode, limit).await
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.inner.health().await
    }

    async fn models(&self) -> Result<BTreeMap<String, Value>, ApiError> {
        self.inner.models().await
    }
}

fn snapshot_with_total(total: u64) -> MetricsSnapshot {
    let mut snapshot = MetricsSnapshot::default();
    snapshot.summaries.insert(
        "baseline".to_string(),
        ModeSummary {
            mode: "baseline".to_string(),
            count: total,
            ..Default::default()
        },
    );
    snapshot.total_inferences = total;
    snapshot
}

fn stream_frame(total: u64, sample_count: usize) -> String {
    let recent: Vec<Value> = (0..sample_count)
        .map(|i| {
            serde_json::json!({
                "mode": "baseline",
                "latency_ms": 100.0 + i as f64,
                "tokens_per_sec": 40.0,
                "memory_mb": 500.0,
                "tokens_generated": 30,
                "timestamp": 1_700_000_000.0 + i as f64
            })
        })
        .collect();
    serde_json::json!({
        "recent": recent,
        "summaries": {
            "baseline": {"mode": "baseline", "count": total, "latency": {}, "throughput": {}, "memory": {}}
        },
        "total": total
    })
    .to_string()
}

#[tokio::test]
async fn test_current_mode_transitions_and_incremental_results() {
    let api = Arc::new(ObservingApi::new(MockBenchApi::new()));
    let runner = BenchmarkRunner::new(api.clone());
    api.attach(runner.run_state());

    let requested = [OptimizationMode::Baseline, OptimizationMode::Quantized];
    runner.run("prompt", &requested, ModelSize::Small, 30).await;

    // At the time each request was issued: current_mode pointed at that
    // mode, and the results of all prior modes were already visible.
    assert_eq!(
        api.observed(),
        vec![
            (Some(OptimizationMode::Baseline), 0),
            (Some(OptimizationMode::Quantized), 1),
        ]
    );

    // After the last mode, current_mode clears and the run is idle again.
    let state = runner.state().await;
    assert_eq!(state.status, RunStatus::Idle);
    assert_eq!(state.current_mode, None);
    assert_eq!(state.results.len(), 2);
}

#[tokio::test]
async fn test_failed_mode_never_reaches_the_next_one() {
    let mock = MockBenchApi::new();
    let first = InferenceRequest {
        text: "prompt".to_string(),
        optimization_mode: OptimizationMode::Baseline,
        model_size: ModelSize::Small,
        max_new_tokens: 30,
    };
    mock.queue_inference(Ok(MockBenchApi::result_for(&first)));
    mock.queue_inference(Err(ApiError::Status {
        status: 500,
        message: "Inference failed: model not loaded".to_string(),
    }));

    let api = Arc::new(ObservingApi::new(mock));
    let runner = BenchmarkRunner::new(api.clone());
    api.attach(runner.run_state());

    runner
        .run(
            "prompt",
            &[
                OptimizationMode::Baseline,
                OptimizationMode::Torchscript,
                OptimizationMode::Onnx,
            ],
            ModelSize::Small,
            30,
        )
        .await;

    // Exactly two requests observed; onnx was never invoked.
    let observed = api.observed();
    assert_eq!(observed.len(), 2);
    assert_eq!(observed[1].0, Some(OptimizationMode::Torchscript));

    let state = runner.state().await;
    assert_eq!(state.status, RunStatus::Error);
    assert_eq!(state.results.len(), 1);
    assert!(state.error.unwrap().contains("torchscript"));
}

#[tokio::test]
async fn test_snapshot_then_stream_session() {
    // A dashboard session: initial snapshot fetch, then live frames.
    let api = MockBenchApi::new();
    api.set_snapshot(snapshot_with_total(10));
    let store = MetricsStore::shared();

    refresh_snapshot(&api, &store).await;
    assert_eq!(store.read().await.snapshot().total_inferences, 10);

    // Two live frames arrive.
    assert!(StreamConsumer::apply_frame(&store, &stream_frame(12, 2)).await);
    assert!(StreamConsumer::apply_frame(&store, &stream_frame(15, 3)).await);

    let guard = store.read().await;
    assert_eq!(guard.snapshot().total_inferences, 15);
    assert_eq!(guard.recent_len(), 5);

    // A malformed frame in between changes nothing.
    drop(guard);
    assert!(!StreamConsumer::apply_frame(&store, "event: oops").await);
    let guard = store.read().await;
    assert_eq!(guard.snapshot().total_inferences, 15);
    assert_eq!(guard.recent_len(), 5);
    assert!(guard.last_error().is_none());
}

#[tokio::test]
async fn test_fetch_failure_leaves_streamed_data_visible() {
    struct FailingApi;

    #[async_trait]
    impl BenchApi for FailingApi {
        async fn fetch_metrics(&self) -> Result<MetricsSnapshot, ApiError> {
            Err(ApiError::Request {
                message: "connection refused".to_string(),
            })
        }

        async fn run_inference(
            &self,
            _request: &InferenceRequest,
        ) -> Result<InferenceResult, ApiError> {
            unreachable!("no inference in this test")
        }

        async fn history(
            &self,
            _mode: Option<OptimizationMode>,
            _limit: u32,
        ) -> Result<HistoryPage, ApiError> {
            Ok(HistoryPage::default())
        }

        async fn health(&self) -> Result<HealthStatus, ApiError> {
            Ok(HealthStatus::default())
        }

        async fn models(&self) -> Result<BTreeMap<String, Value>, ApiError> {
            Ok(BTreeMap::new())
        }
    }

    let store = MetricsStore::shared();
    assert!(StreamConsumer::apply_frame(&store, &stream_frame(3, 3)).await);

    refresh_snapshot(&FailingApi, &store).await;

    // Stale-but-valid data stays; only the error message marks the failure.
    let guard = store.read().await;
    assert_eq!(guard.snapshot().total_inferences, 3);
    assert_eq!(guard.recent_len(), 3);
    let error = guard.last_error().unwrap();
    assert!(error.contains("connection refused"));
}
