//! Session Metrics Collection
//!
//! Counters, timing samples and an error log recorded for the lifetime of a
//! session. Every component reports into a shared [`MetricsCollector`]; the
//! collector is injectable so tests can build isolated instances, and a
//! process-wide instance is created lazily on first use through
//! [`global_metrics`].
//!
//! Recording never fails. Locks poisoned by a panicking writer are recovered
//! so telemetry keeps flowing.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Default number of error records retained in the log
pub const DEFAULT_ERROR_LOG_CAPACITY: usize = 1000;

/// Metric tags, ordered for stable output
pub type Tags = BTreeMap<String, String>;

/// Build a tag map from string pairs
pub fn tags<const N: usize>(pairs: [(&str, &str); N]) -> Tags {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ----------------------------------------------------------------------------
// Records
// ----------------------------------------------------------------------------

/// Single immutable metric entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub tags: Tags,
}

/// Aggregate view over the duration samples recorded under one name
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TimingStat {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub count: usize,
}

impl TimingStat {
    /// Recompute the aggregate from raw samples.
    ///
    /// Samples are summed in sorted order so the result does not depend on
    /// the order in which concurrent writers appended them. Non-finite
    /// samples are skipped.
    pub fn from_samples(samples: &[f64]) -> Self {
        let mut sorted: Vec<f64> = samples.iter().copied().filter(|s| s.is_finite()).collect();
        if sorted.is_empty() {
            return Self::default();
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        let sum: f64 = sorted.iter().sum();
        let avg = (sum / sorted.len() as f64).max(min).min(max);

        Self {
            min,
            max,
            avg,
            count: sorted.len(),
        }
    }
}

/// Recorded failure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub context: BTreeMap<String, String>,
}

/// Structured snapshot returned by [`MetricsCollector::summary`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub uptime_seconds: f64,
    pub uptime_formatted: String,
    pub counters: BTreeMap<String, u64>,
    pub timings: BTreeMap<String, TimingStat>,
    pub error_count: u64,
    pub error_types: BTreeMap<String, u64>,
    pub total_metrics: usize,
}

// ----------------------------------------------------------------------------
// Metrics Collector
// ----------------------------------------------------------------------------

/// Collects counters, timings and errors for a session
pub struct MetricsCollector {
    /// Append-only metric history
    metrics: Mutex<Vec<Metric>>,
    /// Accumulated counter values
    counters: DashMap<String, u64>,
    /// Raw duration samples per timer name, in seconds
    timers: DashMap<String, Vec<f64>>,
    /// Most recent error records
    errors: Mutex<VecDeque<ErrorRecord>>,
    /// Error totals per type, unaffected by log eviction
    error_types: DashMap<String, u64>,
    error_total: AtomicU64,
    error_log_capacity: usize,
    started: Mutex<Instant>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("counters", &self.counters.len())
            .field("timers", &self.timers.len())
            .field("errors", &self.error_total.load(Ordering::Relaxed))
            .finish()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::with_error_capacity(DEFAULT_ERROR_LOG_CAPACITY)
    }

    /// Create a collector retaining at most `capacity` error records
    pub fn with_error_capacity(capacity: usize) -> Self {
        Self {
            metrics: Mutex::new(Vec::new()),
            counters: DashMap::new(),
            timers: DashMap::new(),
            errors: Mutex::new(VecDeque::new()),
            error_types: DashMap::new(),
            error_total: AtomicU64::new(0),
            error_log_capacity: capacity.max(1),
            started: Mutex::new(Instant::now()),
        }
    }

    fn push_metric(&self, name: String, value: f64, tags: Tags) {
        lock(&self.metrics).push(Metric {
            name,
            value,
            timestamp: Utc::now(),
            tags,
        });
    }

    /// Add `value` to the named counter
    pub fn increment(&self, name: &str, value: u64, tags: Tags) {
        let total = {
            let mut counter = self.counters.entry(name.to_string()).or_insert(0);
            *counter += value;
            *counter
        };
        self.push_metric(name.to_string(), value as f64, tags);
        debug!("Metric incremented: {} = {}", name, total);
    }

    /// Add one to the named counter with no tags
    pub fn incr(&self, name: &str) {
        self.increment(name, 1, Tags::new());
    }

    /// Record a duration sample in seconds
    pub fn record_timing(&self, name: &str, duration_secs: f64, tags: Tags) {
        if !duration_secs.is_finite() {
            warn!("Ignoring non-finite timing for {}: {}", name, duration_secs);
            return;
        }
        self.timers
            .entry(name.to_string())
            .or_default()
            .push(duration_secs);
        self.push_metric(format!("{}_duration", name), duration_secs, tags);
        debug!("Timing recorded: {} = {:.3}s", name, duration_secs);
    }

    /// Record an error and bump the `errors` counter tagged by type.
    ///
    /// Context values are rendered with `Display`; entries with an empty key
    /// are dropped.
    pub fn record_error(
        &self,
        error_type: &str,
        message: impl Into<String>,
        context: &[(&str, &dyn fmt::Display)],
    ) {
        let message = message.into();
        let context = context
            .iter()
            .filter(|(key, _)| !key.is_empty())
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        {
            let mut errors = lock(&self.errors);
            if errors.len() >= self.error_log_capacity {
                errors.pop_front();
            }
            errors.push_back(ErrorRecord {
                error_type: error_type.to_string(),
                message: message.clone(),
                timestamp: Utc::now(),
                context,
            });
        }
        *self.error_types.entry(error_type.to_string()).or_insert(0) += 1;
        self.error_total.fetch_add(1, Ordering::Relaxed);

        self.increment("errors", 1, tags([("type", error_type)]));
        warn!("Error recorded: {} - {}", error_type, message);
    }

    /// Accumulated counter value, zero if never incremented
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).map(|v| *v).unwrap_or(0)
    }

    /// Aggregate timing statistics, zeros if no samples
    pub fn timing_stats(&self, name: &str) -> TimingStat {
        self.timers
            .get(name)
            .map(|samples| TimingStat::from_samples(&samples))
            .unwrap_or_default()
    }

    /// Snapshot of the retained error log, oldest first
    pub fn errors(&self) -> Vec<ErrorRecord> {
        lock(&self.errors).iter().cloned().collect()
    }

    /// The last `limit` error records
    pub fn recent_errors(&self, limit: usize) -> Vec<ErrorRecord> {
        let errors = lock(&self.errors);
        let start = errors.len().saturating_sub(limit);
        errors.iter().skip(start).cloned().collect()
    }

    /// Number of metric entries recorded since creation or last reset
    pub fn metric_count(&self) -> usize {
        lock(&self.metrics).len()
    }

    pub fn uptime_seconds(&self) -> f64 {
        lock(&self.started).elapsed().as_secs_f64()
    }

    pub fn summary(&self) -> MetricsSummary {
        let uptime = self.uptime_seconds();

        MetricsSummary {
            uptime_seconds: uptime,
            uptime_formatted: format_uptime(uptime),
            counters: self
                .counters
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
            timings: self
                .timers
                .iter()
                .map(|entry| (entry.key().clone(), TimingStat::from_samples(entry.value())))
                .collect(),
            error_count: self.error_total.load(Ordering::Relaxed),
            error_types: self
                .error_types
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
            total_metrics: self.metric_count(),
        }
    }

    /// Clear all state and restart the uptime clock.
    ///
    /// Not synchronized with in-flight recordings.
    pub fn reset(&self) {
        lock(&self.metrics).clear();
        self.counters.clear();
        self.timers.clear();
        lock(&self.errors).clear();
        self.error_types.clear();
        self.error_total.store(0, Ordering::Relaxed);
        *lock(&self.started) = Instant::now();
        info!("Metrics reset");
    }

    /// Start a scoped timer that records on drop
    pub fn time(&self, name: &str, tags: Tags) -> TimingGuard<'_> {
        TimingGuard {
            collector: self,
            name: name.to_string(),
            tags: Some(tags),
            started: Instant::now(),
        }
    }

    /// Await `future`, recording its duration however it completes
    pub async fn timed<F: Future>(&self, name: &str, tags: Tags, future: F) -> F::Output {
        let _guard = self.time(name, tags);
        future.await
    }
}

// ----------------------------------------------------------------------------
// Scoped Timing
// ----------------------------------------------------------------------------

/// Records the elapsed time under its name when dropped
///
/// Dropping covers every exit path: normal return, `?` propagation, panics
/// and cancellation of the enclosing future.
#[must_use = "the timing is recorded when the guard is dropped"]
pub struct TimingGuard<'a> {
    collector: &'a MetricsCollector,
    name: String,
    tags: Option<Tags>,
    started: Instant,
}

impl TimingGuard<'_> {
    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

impl Drop for TimingGuard<'_> {
    fn drop(&mut self) {
        let tags = self.tags.take().unwrap_or_default();
        self.collector
            .record_timing(&self.name, self.started.elapsed().as_secs_f64(), tags);
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Format an uptime as `"{h}h {m}m {s}s"`, dropping leading zero units
pub fn format_uptime(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

static GLOBAL_METRICS: OnceLock<Arc<MetricsCollector>> = OnceLock::new();

/// Process-wide collector, created on first use
pub fn global_metrics() -> Arc<MetricsCollector> {
    GLOBAL_METRICS
        .get_or_init(|| Arc::new(MetricsCollector::new()))
        .clone()
}

/// Reset the process-wide collector if it has been created
pub fn reset_global_metrics() {
    if let Some(metrics) = GLOBAL_METRICS.get() {
        metrics.reset();
    }
}
