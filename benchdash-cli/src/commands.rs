//! Subcommand implementations.

use benchdash_core::api::{BenchApi, HttpBenchApi};
use benchdash_core::report;
use benchdash_core::runner::{BenchmarkRunner, RunStatus};
use benchdash_core::store::{refresh_snapshot, MetricsStore};
use benchdash_core::stream::StreamConsumer;
use benchdash_core::types::{
    InferenceRequest, InferenceResult, MetricsSnapshot, ModelSize, OptimizationMode,
};
use benchdash_core::DashboardConfig;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn print_snapshot(snapshot: &MetricsSnapshot) {
    println!("total inferences: {}", snapshot.total_inferences);

    let active: Vec<_> = snapshot.summaries.values().filter(|s| s.count > 0).collect();
    if active.is_empty() {
        println!("no metrics recorded yet");
        return;
    }

    println!();
    println!(
        "{:<12} {:>6} {:>10} {:>10} {:>10} {:>12} {:>10}",
        "mode", "count", "mean", "p95", "tok/s", "mem (MB)", "rps"
    );
    for summary in &active {
        println!(
            "{:<12} {:>6} {:>10} {:>10} {:>10.1} {:>12.1} {:>10.2}",
            summary.mode,
            summary.count,
            report::format_latency_ms(summary.latency.mean),
            report::format_latency_ms(summary.latency.p95),
            summary.throughput.mean_tokens_per_sec,
            summary.memory.mean_mb,
            summary.throughput.requests_per_sec,
        );
    }

    let ranked = report::ranked_entries(snapshot);
    if !ranked.is_empty() {
        println!();
        println!("{:<12} {:>8} {:>14}", "mode", "speedup", "cost / 1M tok");
        for entry in ranked {
            println!(
                "{:<12} {:>8} {:>14}",
                entry.summary.mode,
                report::format_speedup(entry.speedup),
                report::format_cost(entry.estimated_cost_per_1m_tokens),
            );
        }
    }
}

fn print_result(result: &InferenceResult) {
    println!(
        "[{:<11}] {} | {:.1} tok/s | {} tokens | {:.1} MB",
        result.optimization_mode,
        report::format_latency_ms(result.latency_ms),
        result.tokens_per_sec,
        result.tokens_generated,
        result.memory_mb,
    );
}

fn resolve_bench_defaults(
    config: &DashboardConfig,
    model_size: Option<ModelSize>,
    max_new_tokens: Option<u32>,
) -> anyhow::Result<(ModelSize, u32)> {
    let model_size = match model_size {
        Some(size) => size,
        None => ModelSize::from_str(&config.bench.model_size)
            .map_err(|e| anyhow::anyhow!("bench.model_size in configuration: {}", e))?,
    };
    Ok((model_size, max_new_tokens.unwrap_or(config.bench.max_new_tokens)))
}

pub async fn snapshot(config: &DashboardConfig) -> anyhow::Result<()> {
    let api = HttpBenchApi::new(config)?;
    let snapshot = api.fetch_metrics().await?;
    print_snapshot(&snapshot);
    Ok(())
}

pub async fn watch(config: &DashboardConfig, interval: u64) -> anyhow::Result<()> {
    let api = HttpBenchApi::new(config)?;
    let store = MetricsStore::shared();

    // Comparison data only refreshes via the snapshot endpoint, so prime it
    // once before following the stream.
    refresh_snapshot(&api, &store).await;

    let cancel = CancellationToken::new();
    let consumer = StreamConsumer::new(api.client(), api.stream_url(), Arc::clone(&store), &config.stream);
    let consumer_task = tokio::spawn(consumer.run(cancel.clone()));

    eprintln!("watching metrics stream, press Ctrl-C to stop");
    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
    let mut last_total = u64::MAX;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {}
        }

        let guard = store.read().await;
        let total = guard.snapshot().total_inferences;
        if total == last_total {
            continue;
        }
        last_total = total;

        let connection = if guard.is_connected() { "live" } else { "reconnecting" };
        let latest = guard.recent().last();
        match latest {
            Some(metric) => {
                let ts = chrono::DateTime::from_timestamp(metric.timestamp as i64, 0)
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_else(|| "--:--:--".to_string());
                println!(
                    "[{}] {:<12} total={} last: {:<11} {} @ {:.1} tok/s",
                    ts,
                    connection,
                    total,
                    metric.mode,
                    report::format_latency_ms(metric.latency_ms),
                    metric.tokens_per_sec,
                );
            }
            None => println!("[--:--:--] {:<12} total={}", connection, total),
        }
    }

    cancel.cancel();
    let _ = consumer_task.await;
    Ok(())
}

pub async fn bench(
    config: &DashboardConfig,
    text: &str,
    modes: Vec<OptimizationMode>,
    model_size: Option<ModelSize>,
    max_new_tokens: Option<u32>,
) -> anyhow::Result<()> {
    // Orchestrator preconditions are guarded here, at the caller layer.
    let text = text.trim();
    if text.is_empty() {
        anyhow::bail!("benchmark prompt must not be empty");
    }
    let modes = if modes.is_empty() {
        OptimizationMode::ALL.to_vec()
    } else {
        modes
    };
    let (model_size, max_new_tokens) = resolve_bench_defaults(config, model_size, max_new_tokens)?;

    tracing::debug!(
        modes = modes.len(),
        model_size = %model_size,
        max_new_tokens,
        "starting benchmark run"
    );
    let api: Arc<dyn BenchApi> = Arc::new(HttpBenchApi::new(config)?);
    let runner = BenchmarkRunner::new(api);

    let run_fut = runner.run(text, &modes, model_size, max_new_tokens);
    tokio::pin!(run_fut);

    // Drive the run while printing partial results as they publish.
    let mut printed = 0;
    let mut announced_mode = None;
    let mut done = false;
    while !done {
        tokio::select! {
            _ = &mut run_fut => done = true,
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }

        let state = runner.state().await;
        if state.current_mode != announced_mode {
            announced_mode = state.current_mode;
            if let Some(mode) = announced_mode {
                println!("running {} ...", mode);
            }
        }
        for result in &state.results[printed..] {
            print_result(result);
        }
        printed = state.results.len();
    }

    let state = runner.state().await;
    match state.status {
        RunStatus::Error => {
            let message = state.error.unwrap_or_else(|| "unknown failure".to_string());
            anyhow::bail!("{} ({} partial results retained)", message, printed);
        }
        _ => {
            println!("benchmark complete: {}/{} modes", printed, modes.len());
            Ok(())
        }
    }
}

pub async fn infer(
    config: &DashboardConfig,
    text: &str,
    mode: OptimizationMode,
    model_size: Option<ModelSize>,
    max_new_tokens: Option<u32>,
) -> anyhow::Result<()> {
    let text = text.trim();
    if text.is_empty() {
        anyhow::bail!("prompt must not be empty");
    }
    let (model_size, max_new_tokens) = resolve_bench_defaults(config, model_size, max_new_tokens)?;

    let api = HttpBenchApi::new(config)?;
    let result = api
        .run_inference(&InferenceRequest {
            text: text.to_string(),
            optimization_mode: mode,
            model_size,
            max_new_tokens,
        })
        .await?;

    print_result(&result);
    println!();
    println!("{}", result.result);
    Ok(())
}

pub async fn history(
    config: &DashboardConfig,
    mode: Option<OptimizationMode>,
    limit: u32,
) -> anyhow::Result<()> {
    let api = HttpBenchApi::new(config)?;
    let page = api.history(mode, limit).await?;

    println!(
        "{:<12} {:>10} {:>10} {:>9}  {}",
        "mode", "latency", "tok/s", "mem MB", "recorded"
    );
    for record in &page.history {
        let recorded = chrono::DateTime::from_timestamp(record.timestamp as i64, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:>10} {:>10.1} {:>9.1}  {}",
            record.optimization_mode,
            report::format_latency_ms(record.latency_ms),
            record.tokens_per_sec,
            record.memory_mb,
            recorded,
        );
    }
    println!(
        "{} of {} stored records",
        page.history.len(),
        page.total_stored
    );
    Ok(())
}

pub async fn health(config: &DashboardConfig) -> anyhow::Result<()> {
    let api = HttpBenchApi::new(config)?;
    let health = api.health().await?;
    println!("status: {}", health.status);
    println!("loaded servers: {}", health.loaded_servers.join(", "));
    Ok(())
}

pub async fn models(config: &DashboardConfig) -> anyhow::Result<()> {
    let api = HttpBenchApi::new(config)?;
    let models = api.models().await?;
    for (mode, info) in models {
        let status = info["status"].as_str().unwrap_or("unknown");
        match info["name"].as_str() {
            Some(name) => println!("{:<12} {:<12} {}", mode, status, name),
            None => println!("{:<12} {}", mode, status),
        }
    }
    Ok(())
}
