//! Performance monitor configuration

use serde::{Deserialize, Serialize};

use ragweave_core::error::{RagError, Result};

/// Rolling-window sizing and alert thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Maximum events retained in the rolling window
    pub window_size: usize,
    /// Events older than this are dropped from the window (seconds)
    pub window_max_age_s: u64,
    /// Alert when the error rate over the window exceeds this fraction
    pub alert_error_rate: f64,
    /// Alert when a path's p95 exceeds the baseline by this many ms
    pub alert_p95_ms: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            window_size: 1_000,
            window_max_age_s: 3_600,
            alert_error_rate: 0.1,
            alert_p95_ms: 5_000.0,
        }
    }
}

impl MonitorConfig {
    /// Validate field ranges
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(RagError::invalid_argument("monitor.window_size must be positive"));
        }
        if !(0.0..=1.0).contains(&self.alert_error_rate) {
            return Err(RagError::invalid_argument(
                "monitor.alert_error_rate must be in [0, 1]",
            ));
        }
        Ok(())
    }
}
