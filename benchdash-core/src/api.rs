//! Backend API client.
//!
//! Defines the [`BenchApi`] trait as the seam between the dashboard core and
//! the benchmarking backend, an HTTP implementation over `reqwest`, and
//! [`MockBenchApi`] for deterministic tests.

use crate::config::DashboardConfig;
use crate::error::ApiError;
use crate::types::{
    HealthStatus, HistoryPage, InferenceRequest, InferenceResult, MetricsSnapshot,
    OptimizationMode,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Request/response boundary to the benchmarking backend.
///
/// The core only ever issues one inference request at a time through this
/// trait; implementations do not need to support concurrent calls.
#[async_trait]
pub trait BenchApi: Send + Sync {
    /// Fetch the full current aggregate state.
    async fn fetch_metrics(&self) -> Result<MetricsSnapshot, ApiError>;

    /// Submit a single inference request.
    async fn run_inference(&self, request: &InferenceRequest) -> Result<InferenceResult, ApiError>;

    /// Page of persisted measurements, newest first, optionally filtered
    /// to one mode.
    async fn history(
        &self,
        mode: Option<OptimizationMode>,
        limit: u32,
    ) -> Result<HistoryPage, ApiError>;

    /// Backend health report.
    async fn health(&self) -> Result<HealthStatus, ApiError>;

    /// Info about the backend's loaded model servers, keyed by mode.
    async fn models(&self) -> Result<BTreeMap<String, Value>, ApiError>;
}

/// HTTP implementation of [`BenchApi`] over `reqwest`.
pub struct HttpBenchApi {
    client: Client,
    base_url: String,
}

impl HttpBenchApi {
    /// Build a client from configuration.
    pub fn new(config: &DashboardConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ApiError::Request {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The underlying `reqwest` client, shared with the stream consumer so
    /// both use the same connection pool.
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    /// Absolute URL of the SSE metrics stream endpoint.
    pub fn stream_url(&self) -> String {
        format!("{}/api/metrics/stream", self.base_url)
    }

    async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = url.as_str(), "GET");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::Request {
                message: format!("request to {} failed: {}", url, e),
            })?;

        let status = response.status();
        let body_text = response.text().await.map_err(|e| ApiError::ResponseParse {
            message: format!("failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &body_text));
        }

        serde_json::from_str(&body_text).map_err(|e| ApiError::ResponseParse {
            message: format!("invalid JSON from {}: {}", url, e),
        })
    }

    fn history_path(mode: Option<OptimizationMode>, limit: u32) -> String {
        let mut path = format!("/api/metrics/history?limit={}", limit);
        if let Some(mode) = mode {
            path.push_str("&mode=");
            path.push_str(mode.as_str());
        }
        path
    }

    /// Map a non-success HTTP response to an `ApiError`, extracting the
    /// backend's `detail` message when the body carries one.
    fn map_http_error(status: reqwest::StatusCode, body_text: &str) -> ApiError {
        let message = serde_json::from_str::<Value>(body_text)
            .ok()
            .and_then(|v| v["detail"].as_str().map(|s| s.to_string()))
            .unwrap_or_else(|| body_text.to_string());

        ApiError::Status {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl BenchApi for HttpBenchApi {
    async fn fetch_metrics(&self) -> Result<MetricsSnapshot, ApiError> {
        let body = self.get_json("/api/metrics").await?;
        serde_json::from_value(body).map_err(|e| ApiError::ResponseParse {
            message: format!("invalid metrics snapshot: {}", e),
        })
    }

    async fn run_inference(&self, request: &InferenceRequest) -> Result<InferenceResult, ApiError> {
        let url = format!("{}/api/inference", self.base_url);
        debug!(
            url = url.as_str(),
            mode = request.optimization_mode.as_str(),
            max_new_tokens = request.max_new_tokens,
            "POST inference"
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::Request {
                message: format!("inference request failed: {}", e),
            })?;

        let status = response.status();
        let body_text = response.text().await.map_err(|e| ApiError::ResponseParse {
            message: format!("failed to read inference response: {}", e),
        })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &body_text));
        }

        serde_json::from_str(&body_text).map_err(|e| ApiError::ResponseParse {
            message: format!("invalid inference response: {}", e),
        })
    }

    async fn history(
        &self,
        mode: Option<OptimizationMode>,
        limit: u32,
    ) -> Result<HistoryPage, ApiError> {
        let path = Self::history_path(mode, limit);
        let body = self.get_json(&path).await?;
        serde_json::from_value(body).map_err(|e| ApiError::ResponseParse {
            message: format!("invalid history response: {}", e),
        })
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        let body = self.get_json("/api/health").await?;
        serde_json::from_value(body).map_err(|e| ApiError::ResponseParse {
            message: format!("invalid health response: {}", e),
        })
    }

    async fn models(&self) -> Result<BTreeMap<String, Value>, ApiError> {
        let body = self.get_json("/api/models").await?;
        serde_json::from_value(body).map_err(|e| ApiError::ResponseParse {
            message: format!("invalid models response: {}", e),
        })
    }
}

/// In-memory [`BenchApi`] with queued inference outcomes, for tests.
///
/// Inference outcomes are served in queue order; every accepted request is
/// recorded so tests can assert exactly which requests were issued (and,
/// crucially, which were not).
#[derive(Default)]
pub struct MockBenchApi {
    snapshot: std::sync::Mutex<MetricsSnapshot>,
    history: std::sync::Mutex<HistoryPage>,
    inference_outcomes: std::sync::Mutex<Vec<Result<InferenceResult, ApiError>>>,
    recorded_requests: std::sync::Mutex<Vec<InferenceRequest>>,
    /// Optional delay before answering an inference call, to exercise
    /// in-flight/late-response behavior.
    inference_delay: std::sync::Mutex<Option<Duration>>,
}

impl MockBenchApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the snapshot returned by `fetch_metrics`.
    pub fn set_snapshot(&self, snapshot: MetricsSnapshot) {
        *self.snapshot.lock().unwrap() = snapshot;
    }

    /// Set the persisted history served by `history`.
    pub fn set_history(&self, page: HistoryPage) {
        *self.history.lock().unwrap() = page;
    }

    /// Queue the outcome for the next inference call.
    pub fn queue_inference(&self, outcome: Result<InferenceResult, ApiError>) {
        self.inference_outcomes.lock().unwrap().push(outcome);
    }

    /// Delay every inference response by the given duration.
    pub fn set_inference_delay(&self, delay: Duration) {
        *self.inference_delay.lock().unwrap() = Some(delay);
    }

    /// All inference requests received so far, in arrival order.
    pub fn recorded_requests(&self) -> Vec<InferenceRequest> {
        self.recorded_requests.lock().unwrap().clone()
    }

    /// Build a plausible successful result for a request.
    pub fn result_for(request: &InferenceRequest) -> InferenceResult {
        InferenceResult {
            result: format!("{} ...generated text", request.text),
            latency_ms: 100.0,
            tokens_per_sec: 40.0,
            tokens_generated: request.max_new_tokens as u64,
            memory_mb: 512.0,
            optimization_mode: request.optimization_mode,
            model_size: request.model_size,
        }
    }
}

#[async_trait]
impl BenchApi for MockBenchApi {
    async fn fetch_metrics(&self) -> Result<MetricsSnapshot, ApiError> {
        Ok(self.snapshot.lock().unwrap().clone())
    }

    async fn run_inference(&self, request: &InferenceRequest) -> Result<InferenceResult, ApiError> {
        self.recorded_requests.lock().unwrap().push(request.clone());

        let delay = *self.inference_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut outcomes = self.inference_outcomes.lock().unwrap();
        if outcomes.is_empty() {
            return Ok(Self::result_for(request));
        }
        outcomes.remove(0)
    }

    async fn history(
        &self,
        mode: Option<OptimizationMode>,
        limit: u32,
    ) -> Result<HistoryPage, ApiError> {
        let stored = self.history.lock().unwrap().clone();
        let mut records = stored.history;
        if let Some(mode) = mode {
            records.retain(|r| r.optimization_mode == mode.as_str());
        }
        records.truncate(limit as usize);
        Ok(HistoryPage {
            history: records,
            total_stored: stored.total_stored,
        })
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        Ok(HealthStatus {
            status: "healthy".to_string(),
            loaded_servers: vec!["baseline".to_string()],
            timestamp: 0.0,
        })
    }

    async fn models(&self) -> Result<BTreeMap<String, Value>, ApiError> {
        Ok(BTreeMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HistoryRecord, ModelSize, OptimizationMode};
    use pretty_assertions::assert_eq;

    fn request(mode: OptimizationMode) -> InferenceRequest {
        InferenceRequest {
            text: "The quick brown fox".to_string(),
            optimization_mode: mode,
            model_size: ModelSize::Small,
            max_new_tokens: 30,
        }
    }

    #[test]
    fn test_map_http_error_extracts_detail() {
        let err = HttpBenchApi::map_http_error(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"detail": "Unknown optimization mode: tensorrt"}"#,
        );
        match err {
            ApiError::Status { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Unknown optimization mode: tensorrt");
            }
            other => panic!("expected Status, got {:?}", other),
        }
    }

    #[test]
    fn test_map_http_error_falls_back_to_raw_body() {
        let err =
            HttpBenchApi::map_http_error(reqwest::StatusCode::BAD_GATEWAY, "upstream unavailable");
        match err {
            ApiError::Status { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream unavailable");
            }
            other => panic!("expected Status, got {:?}", other),
        }
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let mut config = DashboardConfig::default();
        config.base_url = "http://localhost:8000/".to_string();
        let api = HttpBenchApi::new(&config).unwrap();
        assert_eq!(api.stream_url(), "http://localhost:8000/api/metrics/stream");
    }

    #[test]
    fn test_history_path_with_and_without_mode_filter() {
        assert_eq!(
            HttpBenchApi::history_path(None, 100),
            "/api/metrics/history?limit=100"
        );
        assert_eq!(
            HttpBenchApi::history_path(Some(OptimizationMode::Onnx), 25),
            "/api/metrics/history?limit=25&mode=onnx"
        );
    }

    #[tokio::test]
    async fn test_mock_history_filters_by_mode_and_truncates() {
        let record = |id: u64, mode: &str| HistoryRecord {
            id,
            optimization_mode: mode.to_string(),
            latency_ms: 90.0,
            tokens_per_sec: 45.0,
            memory_mb: 400.0,
            tokens_generated: 50,
            timestamp: 1_700_000_000.0 + id as f64,
        };

        let api = MockBenchApi::new();
        api.set_history(HistoryPage {
            history: vec![
                record(3, "baseline"),
                record(2, "quantized"),
                record(1, "baseline"),
            ],
            total_stored: 3,
        });

        let page = api
            .history(Some(OptimizationMode::Baseline), 1)
            .await
            .unwrap();
        assert_eq!(page.history.len(), 1);
        assert_eq!(page.history[0].id, 3);
        assert_eq!(page.total_stored, 3);
    }

    #[tokio::test]
    async fn test_mock_serves_queued_outcomes_in_order() {
        let api = MockBenchApi::new();
        let req = request(OptimizationMode::Baseline);
        api.queue_inference(Ok(MockBenchApi::result_for(&req)));
        api.queue_inference(Err(ApiError::Status {
            status: 500,
            message: "Inference failed: out of memory".to_string(),
        }));

        assert!(api.run_inference(&req).await.is_ok());
        assert!(api.run_inference(&req).await.is_err());
        assert_eq!(api.recorded_requests().len(), 2);
    }
}
