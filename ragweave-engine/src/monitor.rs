//! Performance monitor
//!
//! Collects one event per routed request into a bounded, age-trimmed
//! window and derives timing percentiles, confidence statistics, error
//! rates, and mode usage. Alerts fire on error-rate spikes and p95
//! regressions against a recorded baseline.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ragweave_config::MonitorConfig;
use ragweave_core::error::ErrorKind;
use ragweave_core::types::QueryMode;

/// Which execution path a measurement belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    /// Single-shot low-latency path
    Speculative,
    /// Multi-iteration reasoning path
    Agentic,
}

impl PathKind {
    /// Stable string form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Speculative => "speculative",
            Self::Agentic => "agentic",
        }
    }
}

/// One routed request's telemetry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEvent {
    /// Completion time
    pub timestamp: DateTime<Utc>,
    /// Requested mode
    pub mode: QueryMode,
    /// Speculative latency, when that path completed
    pub speculative_ms: Option<u64>,
    /// Agentic latency, when that path completed
    pub agentic_ms: Option<u64>,
    /// Which path completed first
    pub first_path: Option<PathKind>,
    /// Speculative confidence, when available
    pub speculative_confidence: Option<f32>,
    /// Agentic confidence, when available
    pub agentic_confidence: Option<f32>,
    /// Error category when the request failed
    pub error_kind: Option<ErrorKind>,
}

impl RequestEvent {
    /// An empty event for a mode, stamped now
    #[must_use]
    pub fn new(mode: QueryMode) -> Self {
        Self {
            timestamp: Utc::now(),
            mode,
            speculative_ms: None,
            agentic_ms: None,
            first_path: None,
            speculative_confidence: None,
            agentic_confidence: None,
            error_kind: None,
        }
    }
}

/// Timing summary for one path
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimingSummary {
    /// Samples in the window
    pub count: usize,
    /// Median latency
    pub p50_ms: f64,
    /// 95th percentile latency
    pub p95_ms: f64,
    /// 99th percentile latency
    pub p99_ms: f64,
}

/// Confidence means and their delta
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfidenceSummary {
    /// Mean speculative confidence
    pub speculative_mean: Option<f32>,
    /// Mean agentic confidence
    pub agentic_mean: Option<f32>,
    /// `agentic_mean - speculative_mean`, when both exist
    pub mean_delta: Option<f32>,
}

/// Alert raised by the monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "alert", rename_all = "snake_case")]
pub enum Alert {
    /// Window error rate exceeded the threshold
    ErrorRateSpike {
        /// Observed rate
        rate: f64,
        /// Configured threshold
        threshold: f64,
    },
    /// A path's p95 regressed past baseline plus threshold
    P95Regression {
        /// Affected path
        path: PathKind,
        /// Current p95
        current_ms: f64,
        /// Recorded baseline p95
        baseline_ms: f64,
    },
}

/// Rolling-window performance monitor
pub struct PerformanceMonitor {
    events: Mutex<VecDeque<RequestEvent>>,
    mode_counts: Mutex<HashMap<QueryMode, u64>>,
    error_counts: Mutex<HashMap<ErrorKind, u64>>,
    component_errors: Mutex<HashMap<String, u64>>,
    baselines: Mutex<HashMap<PathKind, f64>>,
    anomalies: AtomicU64,
    config: MonitorConfig,
}

impl std::fmt::Debug for PerformanceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceMonitor")
            .field("events", &self.events.lock().len())
            .field("anomalies", &self.anomalies.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl PerformanceMonitor {
    /// Create a monitor
    #[must_use]
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            mode_counts: Mutex::new(HashMap::new()),
            error_counts: Mutex::new(HashMap::new()),
            component_errors: Mutex::new(HashMap::new()),
            baselines: Mutex::new(HashMap::new()),
            anomalies: AtomicU64::new(0),
            config,
        }
    }

    /// Record one routed request
    pub fn record(&self, event: RequestEvent) {
        *self.mode_counts.lock().entry(event.mode).or_insert(0) += 1;
        if let Some(kind) = event.error_kind {
            *self.error_counts.lock().entry(kind).or_insert(0) += 1;
        }

        let mut events = self.events.lock();
        events.push_back(event);
        while events.len() > self.config.window_size {
            events.pop_front();
        }
        let max_age = Duration::from_secs(self.config.window_max_age_s);
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::hours(1));
        while events.front().is_some_and(|e| e.timestamp < cutoff) {
            events.pop_front();
        }
    }

    /// Record a component-scoped failure (e.g. a retriever or tool)
    pub fn record_component_error(&self, component: &str, kind: ErrorKind) {
        debug!(component, kind = kind.as_str(), "component error recorded");
        *self
            .component_errors
            .lock()
            .entry(component.to_string())
            .or_insert(0) += 1;
        *self.error_counts.lock().entry(kind).or_insert(0) += 1;
    }

    /// Record a confidence anomaly (speculative beat agentic)
    pub fn record_anomaly(&self) {
        self.anomalies.fetch_add(1, Ordering::Relaxed);
    }

    /// Anomaly count
    #[must_use]
    pub fn anomalies(&self) -> u64 {
        self.anomalies.load(Ordering::Relaxed)
    }

    fn latencies(&self, path: PathKind, mode: Option<QueryMode>) -> Vec<u64> {
        self.events
            .lock()
            .iter()
            .filter(|e| mode.is_none() || mode == Some(e.mode))
            .filter_map(|e| match path {
                PathKind::Speculative => e.speculative_ms,
                PathKind::Agentic => e.agentic_ms,
            })
            .collect()
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn percentile(sorted: &[u64], percentile: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }
        let rank = ((percentile / 100.0) * sorted.len() as f64).ceil() as usize;
        sorted[rank.clamp(1, sorted.len()) - 1] as f64
    }

    /// Timing percentiles for a path, optionally restricted to one mode
    #[must_use]
    pub fn timing_summary(&self, path: PathKind, mode: Option<QueryMode>) -> TimingSummary {
        let mut latencies = self.latencies(path, mode);
        latencies.sort_unstable();
        TimingSummary {
            count: latencies.len(),
            p50_ms: Self::percentile(&latencies, 50.0),
            p95_ms: Self::percentile(&latencies, 95.0),
            p99_ms: Self::percentile(&latencies, 99.0),
        }
    }

    /// Confidence means and delta across the window
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn confidence_summary(&self) -> ConfidenceSummary {
        let events = self.events.lock();
        let mean = |values: Vec<f32>| -> Option<f32> {
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f32>() / values.len() as f32)
            }
        };
        let speculative_mean = mean(
            events
                .iter()
                .filter_map(|e| e.speculative_confidence)
                .collect(),
        );
        let agentic_mean = mean(events.iter().filter_map(|e| e.agentic_confidence).collect());
        ConfidenceSummary {
            speculative_mean,
            agentic_mean,
            mean_delta: match (speculative_mean, agentic_mean) {
                (Some(s), Some(a)) => Some(a - s),
                _ => None,
            },
        }
    }

    /// Fraction of windowed requests that failed
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn error_rate(&self) -> f64 {
        let events = self.events.lock();
        if events.is_empty() {
            return 0.0;
        }
        let failed = events.iter().filter(|e| e.error_kind.is_some()).count();
        failed as f64 / events.len() as f64
    }

    /// Error counts keyed by kind
    #[must_use]
    pub fn error_counts(&self) -> HashMap<ErrorKind, u64> {
        self.error_counts.lock().clone()
    }

    /// Error counts keyed by component
    #[must_use]
    pub fn component_error_counts(&self) -> HashMap<String, u64> {
        self.component_errors.lock().clone()
    }

    /// Requests per mode
    #[must_use]
    pub fn mode_usage(&self) -> HashMap<QueryMode, u64> {
        self.mode_counts.lock().clone()
    }

    /// Record a path's baseline p95 for regression alerts
    pub fn set_baseline(&self, path: PathKind, p95_ms: f64) {
        self.baselines.lock().insert(path, p95_ms);
    }

    /// Evaluate alert conditions against the current window
    #[must_use]
    pub fn alerts(&self) -> Vec<Alert> {
        let mut alerts = Vec::new();

        let rate = self.error_rate();
        if rate > self.config.alert_error_rate {
            alerts.push(Alert::ErrorRateSpike {
                rate,
                threshold: self.config.alert_error_rate,
            });
        }

        let baselines = self.baselines.lock().clone();
        for (path, baseline_ms) in baselines {
            let summary = self.timing_summary(path, None);
            if summary.count > 0 && summary.p95_ms > baseline_ms + self.config.alert_p95_ms {
                alerts.push(Alert::P95Regression {
                    path,
                    current_ms: summary.p95_ms,
                    baseline_ms,
                });
            }
        }
        alerts
    }
}
