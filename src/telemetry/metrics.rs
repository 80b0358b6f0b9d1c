// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Lightweight in-process metrics.
//!
//! Tracks operation latencies, token usage and how routing decisions were
//! reached. No exporter is attached; the CLI prints a report on demand.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

/// Global metrics instance.
pub static GLOBAL_METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

/// How the orchestrator arrived at its delegate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutingOutcome {
    /// The model picked a registered agent.
    Direct,
    /// No usable candidate; the configured fallback agent was used.
    Fallback,
    /// The candidate was unknown; the first other registered agent was used.
    FirstAvailable,
    /// Nothing to delegate to.
    Failed,
    /// The request was cancelled before delegation.
    Cancelled,
}

impl RoutingOutcome {
    const ALL: [RoutingOutcome; 5] = [
        RoutingOutcome::Direct,
        RoutingOutcome::Fallback,
        RoutingOutcome::FirstAvailable,
        RoutingOutcome::Failed,
        RoutingOutcome::Cancelled,
    ];

    fn index(self) -> usize {
        match self {
            RoutingOutcome::Direct => 0,
            RoutingOutcome::Fallback => 1,
            RoutingOutcome::FirstAvailable => 2,
            RoutingOutcome::Failed => 3,
            RoutingOutcome::Cancelled => 4,
        }
    }
}

impl fmt::Display for RoutingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoutingOutcome::Direct => "direct",
            RoutingOutcome::Fallback => "fallback",
            RoutingOutcome::FirstAvailable => "first_available",
            RoutingOutcome::Failed => "failed",
            RoutingOutcome::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Central metrics collection.
#[derive(Debug)]
pub struct Metrics {
    operations: RwLock<HashMap<String, OperationMetrics>>,
    routing: [AtomicU64; 5],
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            operations: RwLock::new(HashMap::new()),
            routing: Default::default(),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a timed operation.
    pub fn record_operation(&self, name: &str, duration: Duration) {
        let mut ops = self.operations.write().unwrap_or_else(|e| e.into_inner());
        ops.entry(name.to_string())
            .or_insert_with(OperationMetrics::new)
            .record(duration);
    }

    /// Record token usage.
    pub fn record_tokens(&self, input: u64, output: u64) {
        self.input_tokens.fetch_add(input, Ordering::Relaxed);
        self.output_tokens.fetch_add(output, Ordering::Relaxed);
    }

    /// Count a routing decision.
    pub fn record_routing(&self, outcome: RoutingOutcome) {
        self.routing[outcome.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Number of routing decisions with the given outcome.
    pub fn routing_count(&self, outcome: RoutingOutcome) -> u64 {
        self.routing[outcome.index()].load(Ordering::Relaxed)
    }

    /// Get metrics for a specific operation.
    pub fn operation_metrics(&self, name: &str) -> Option<OperationMetrics> {
        self.operations.read().unwrap_or_else(|e| e.into_inner()).get(name).cloned()
    }

    /// Get total token counts as `(input, output)`.
    pub fn token_counts(&self) -> (u64, u64) {
        (
            self.input_tokens.load(Ordering::Relaxed),
            self.output_tokens.load(Ordering::Relaxed),
        )
    }

    /// Take a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let routing = RoutingOutcome::ALL
            .iter()
            .map(|outcome| (*outcome, self.routing_count(*outcome)))
            .collect();
        let (input_tokens, output_tokens) = self.token_counts();

        MetricsSnapshot {
            operations: self.operations.read().unwrap_or_else(|e| e.into_inner()).clone(),
            routing,
            input_tokens,
            output_tokens,
            uptime: self.start_time.elapsed(),
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        self.operations.write().unwrap_or_else(|e| e.into_inner()).clear();
        for counter in &self.routing {
            counter.store(0, Ordering::Relaxed);
        }
        self.input_tokens.store(0, Ordering::Relaxed);
        self.output_tokens.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics for one named operation.
#[derive(Debug, Clone)]
pub struct OperationMetrics {
    pub count: u64,
    pub total_duration: Duration,
    pub max_duration: Duration,
    pub histogram: Histogram,
}

impl OperationMetrics {
    /// Create new operation metrics.
    pub fn new() -> Self {
        Self {
            count: 0,
            total_duration: Duration::ZERO,
            max_duration: Duration::ZERO,
            histogram: Histogram::default(),
        }
    }

    /// Record an operation.
    pub fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total_duration += duration;
        self.max_duration = self.max_duration.max(duration);
        self.histogram.record(duration);
    }

    /// Calculate average duration.
    pub fn avg_duration(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.count as u32
        }
    }
}

impl Default for OperationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-bucket latency histogram.
///
/// Bucket bounds are in milliseconds and sized for model round trips:
/// 10ms, 100ms, 1s, 5s, 30s, then overflow.
#[derive(Debug, Clone)]
pub struct Histogram {
    bounds_ms: Vec<u64>,
    counts: Vec<u64>,
}

impl Histogram {
    /// Create a histogram with custom bucket bounds in milliseconds.
    pub fn with_bounds(bounds_ms: Vec<u64>) -> Self {
        let counts = vec![0; bounds_ms.len() + 1];
        Self { bounds_ms, counts }
    }

    /// Record a duration value.
    pub fn record(&mut self, duration: Duration) {
        let millis = duration.as_millis() as u64;
        let idx = self
            .bounds_ms
            .iter()
            .position(|&b| millis <= b)
            .unwrap_or(self.bounds_ms.len());
        self.counts[idx] += 1;
    }

    /// Counts per bucket, overflow last.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Upper bound of the bucket holding the given percentile.
    pub fn percentile(&self, p: f64) -> Duration {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;
        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                let bound = self
                    .bounds_ms
                    .get(i)
                    .copied()
                    .unwrap_or_else(|| self.bounds_ms.last().copied().unwrap_or(0) * 2);
                return Duration::from_millis(bound);
            }
        }
        Duration::ZERO
    }

    /// Get p99 latency.
    pub fn p99(&self) -> Duration {
        self.percentile(99.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::with_bounds(vec![10, 100, 1_000, 5_000, 30_000])
    }
}

/// A snapshot of all metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub operations: HashMap<String, OperationMetrics>,
    pub routing: Vec<(RoutingOutcome, u64)>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Format as a human-readable report.
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Metrics Report ===\n\n");
        report.push_str(&format!("Uptime: {:.2?}\n", self.uptime));
        report.push_str(&format!(
            "Tokens: {} input, {} output\n\n",
            self.input_tokens, self.output_tokens
        ));

        report.push_str("Routing:\n");
        for (outcome, count) in &self.routing {
            report.push_str(&format!("  {}: {}\n", outcome, count));
        }

        if !self.operations.is_empty() {
            report.push_str("\nOperations:\n");
            let mut names: Vec<_> = self.operations.keys().collect();
            names.sort();
            for name in names {
                let metrics = &self.operations[name];
                report.push_str(&format!(
                    "  {}: {} ops, avg {:.2?}, p99 {:.2?}\n",
                    name,
                    metrics.count,
                    metrics.avg_duration(),
                    metrics.histogram.p99()
                ));
            }
        }

        report
    }
}
