//! Drift calculators and their results.
//!
//! Every calculator follows the same lifecycle: construct from a validated
//! config, [`Calculator::fit`] on reference data, then
//! [`Calculator::calculate`] on any number of analysis batches. Results hold
//! one row per chunk in chunk order.

pub mod multivariate;
pub mod plots;
pub mod ranking;
pub mod reconstruction;
pub mod target;
pub mod thresholds;
pub mod univariate;

use crate::chunk::{Chunk, Period};
use crate::data::source::DataBatch;
use crate::error::DriftError;
use chrono::{DateTime, Utc};
use plots::{PlotKind, StepPlot};
use serde::{Deserialize, Serialize};

pub use multivariate::{
    DataReconstructionDriftCalculator, ReconstructionDriftResult, ReconstructionDriftRow,
};
pub use ranking::{AlertCountRanking, FeatureRank};
pub use target::{TargetDistributionCalculator, TargetDistributionResult, TargetDriftRow};
pub use thresholds::{ALERT_THRESHOLD_SIGMA, AlertThresholds};
pub use univariate::{
    FeatureDrift, StatisticalTest, UnivariateDriftResult, UnivariateDriftRow,
    UnivariateStatisticalDriftCalculator,
};

/// p-value below which a statistical test raises an alert.
pub const ALERT_THRESHOLD_P_VALUE: f64 = 0.05;

/// A calculator fitted on reference data and applied to analysis data.
pub trait Calculator {
    type Output: CalculatorResult;

    /// Learn everything needed for later calculations from `reference`.
    ///
    /// Re-fitting replaces all previously fitted state. On error the
    /// calculator keeps its previous state.
    fn fit(&mut self, reference: &DataBatch) -> Result<(), DriftError>;

    /// Compute drift for `data` using the fitted state only.
    fn calculate(&self, data: &DataBatch) -> Result<Self::Output, DriftError>;

    fn is_fitted(&self) -> bool;
}

/// Read-only access to a calculation result.
pub trait CalculatorResult {
    fn calculator_name(&self) -> &'static str;

    /// Number of result rows, one per chunk.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Result rows as a JSON array.
    fn to_json(&self) -> Result<serde_json::Value, DriftError>;

    /// Render a plot specification of `kind`.
    fn plot(&self, kind: PlotKind, plot_reference: bool) -> Result<StepPlot, DriftError> {
        let _ = plot_reference;
        Err(DriftError::unsupported(format!(
            "plot kind '{kind}' is not available for {}",
            self.calculator_name()
        )))
    }

    /// Like [`CalculatorResult::plot`] with the kind given by name.
    fn plot_named(&self, kind: &str, plot_reference: bool) -> Result<StepPlot, DriftError> {
        self.plot(kind.parse()?, plot_reference)
    }
}

/// Chunk identity columns shared by every result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSummary {
    pub key: String,
    pub start_index: usize,
    pub end_index: usize,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub period: Period,
}

impl From<&Chunk> for ChunkSummary {
    fn from(chunk: &Chunk) -> Self {
        Self {
            key: chunk.key.clone(),
            start_index: chunk.start_index,
            end_index: chunk.end_index,
            start_date: chunk.start_datetime,
            end_date: chunk.end_datetime,
            period: if chunk.is_transition {
                Period::Analysis
            } else {
                chunk.period
            },
        }
    }
}
