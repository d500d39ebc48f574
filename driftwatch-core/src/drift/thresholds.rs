//! Alert thresholds derived from reference-period variability.

use crate::algorithms::stats::{mean, sample_std};
use serde::Serialize;

/// Width of the alert band in sample standard deviations.
pub const ALERT_THRESHOLD_SIGMA: f64 = 3.0;

/// Lower and upper alert bounds on a per-chunk metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlertThresholds {
    pub lower: f64,
    pub upper: f64,
}

impl AlertThresholds {
    /// `mean ± ALERT_THRESHOLD_SIGMA · std` of the reference chunk values.
    ///
    /// Fewer than two reference chunks leave the spread undefined; both
    /// bounds are then NaN and no value ever alerts.
    pub fn from_reference(values: &[f64]) -> Self {
        let center = mean(values);
        let spread = sample_std(values);
        if spread.is_nan() {
            tracing::warn!(
                reference_chunks = values.len(),
                "at least two reference chunks are needed to derive alert thresholds; alerts are disabled"
            );
        }
        Self {
            lower: center - ALERT_THRESHOLD_SIGMA * spread,
            upper: center + ALERT_THRESHOLD_SIGMA * spread,
        }
    }

    /// True when `value` lies strictly outside `[lower, upper]`.
    pub fn is_alert(&self, value: f64) -> bool {
        value > self.upper || value < self.lower
    }
}
