//! Display contracts for the comparison table.
//!
//! These helpers shape what the backend sent; they never recompute
//! statistics from raw samples.

use crate::types::{ComparisonEntry, MetricsSnapshot};

/// Comparison entries with recorded data, best speedup first.
///
/// Modes with `count == 0` carry no meaningful statistics and are excluded.
/// Entries without a speedup (no baseline data) sort last.
pub fn ranked_entries(snapshot: &MetricsSnapshot) -> Vec<&ComparisonEntry> {
    let mut entries: Vec<&ComparisonEntry> = snapshot
        .comparison
        .values()
        .filter(|e| e.summary.count > 0)
        .collect();
    entries.sort_by(|a, b| {
        let a = a.speedup.filter(|v| v.is_finite()).unwrap_or(f64::NEG_INFINITY);
        let b = b.speedup.filter(|v| v.is_finite()).unwrap_or(f64::NEG_INFINITY);
        b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
    });
    entries
}

/// Render a speedup ratio, e.g. `1.85x`. Absent or non-finite values
/// (no baseline data yet) render as `n/a`.
pub fn format_speedup(speedup: Option<f64>) -> String {
    match speedup {
        Some(v) if v.is_finite() => format!("{:.2}x", v),
        _ => "n/a".to_string(),
    }
}

/// Render an estimated cost per 1M tokens, e.g. `$0.0421`.
pub fn format_cost(cost: Option<f64>) -> String {
    match cost {
        Some(v) if v.is_finite() => format!("${:.4}", v),
        _ => "n/a".to_string(),
    }
}

/// Render a latency in milliseconds with one decimal, e.g. `120.5ms`.
pub fn format_latency_ms(latency_ms: f64) -> String {
    format!("{:.1}ms", latency_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModeSummary;
    use pretty_assertions::assert_eq;

    fn entry(mode: &str, count: u64, speedup: Option<f64>) -> ComparisonEntry {
        ComparisonEntry {
            summary: ModeSummary {
                mode: mode.to_string(),
                count,
                ..Default::default()
            },
            speedup,
            estimated_cost_per_1m_tokens: Some(0.01),
        }
    }

    #[test]
    fn test_ranked_entries_excludes_empty_and_sorts_by_speedup() {
        let mut snapshot = MetricsSnapshot::default();
        snapshot
            .comparison
            .insert("baseline".to_string(), entry("baseline", 5, Some(1.0)));
        snapshot
            .comparison
            .insert("quantized".to_string(), entry("quantized", 5, Some(1.8)));
        snapshot
            .comparison
            .insert("onnx".to_string(), entry("onnx", 0, Some(2.5)));
        snapshot
            .comparison
            .insert("batched".to_string(), entry("batched", 2, None));

        let ranked = ranked_entries(&snapshot);
        let names: Vec<_> = ranked.iter().map(|e| e.summary.mode.as_str()).collect();
        // onnx is excluded (count 0); no-speedup entries sort last.
        assert_eq!(names, vec!["quantized", "baseline", "batched"]);
    }

    #[test]
    fn test_format_speedup() {
        assert_eq!(format_speedup(Some(1.8512)), "1.85x");
        assert_eq!(format_speedup(None), "n/a");
        assert_eq!(format_speedup(Some(f64::INFINITY)), "n/a");
    }

    #[test]
    fn test_format_cost() {
        assert_eq!(format_cost(Some(0.04212)), "$0.0421");
        assert_eq!(format_cost(Some(f64::INFINITY)), "n/a");
        assert_eq!(format_cost(None), "n/a");
    }

    #[test]
    fn test_format_latency() {
        assert_eq!(format_latency_ms(120.46), "120.5ms");
    }
}
