//! Drift in the distribution of the target (label) column.

use crate::algorithms::stats::{chi2_contingency, mean};
use crate::chunk::{Chunk, Chunker, Period};
use crate::config::TargetConfig;
use crate::data::source::{BatchSlice, DataBatch};
use crate::drift::univariate::{contingency_table, value_counts};
use crate::drift::{ALERT_THRESHOLD_P_VALUE, Calculator, CalculatorResult, ChunkSummary};
use crate::error::DriftError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Minimum rows per chunk for a meaningful target distribution.
pub const TARGET_MINIMUM_CHUNK_SIZE: usize = 300;

#[derive(Debug)]
struct FittedTargets {
    counts: BTreeMap<String, f64>,
    reference_results: Arc<[TargetDriftRow]>,
}

/// Tracks the missing rate, mean and value distribution of the target per chunk.
#[derive(Debug)]
pub struct TargetDistributionCalculator {
    config: TargetConfig,
    chunker: Box<dyn Chunker>,
    fitted: Option<FittedTargets>,
}

impl TargetDistributionCalculator {
    pub fn new(config: TargetConfig) -> Result<Self, DriftError> {
        let chunking = config.validate()?;
        Ok(Self {
            chunker: chunking.chunker(),
            config,
            fitted: None,
        })
    }

    pub fn with_chunker(mut self, chunker: Box<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn reference_results(&self) -> Option<&[TargetDriftRow]> {
        self.fitted.as_ref().map(|f| &f.reference_results[..])
    }

    fn check(&self, data: &DataBatch) -> Result<(), DriftError> {
        if data.is_empty() {
            return Err(DriftError::empty_data());
        }
        if data.column_index(&self.config.target_column_name).is_none() {
            return Err(DriftError::invalid_input(format!(
                "target data column '{}' not found in data columns: {:?}",
                self.config.target_column_name, data.columns
            )));
        }
        Ok(())
    }

    /// Shared by fit and calculate, so both tag untagged rows the same way.
    fn rows(
        &self,
        reference_counts: &BTreeMap<String, f64>,
        data: &DataBatch,
    ) -> Result<Vec<TargetDriftRow>, DriftError> {
        let target = &self.config.target_column_name;
        let chunks = self.chunker.split(
            data,
            std::slice::from_ref(target),
            TARGET_MINIMUM_CHUNK_SIZE,
            &self.config.timestamp_column_name,
            Period::Analysis,
        )?;
        chunks
            .iter()
            .map(|chunk| target_row(chunk, data.slice(chunk.rows()), target, reference_counts))
            .collect()
    }
}

fn target_row(
    chunk: &Chunk,
    data: BatchSlice<'_>,
    target: &str,
    reference_counts: &BTreeMap<String, f64>,
) -> Result<TargetDriftRow, DriftError> {
    let values: Vec<&serde_json::Value> = data.column_by_name(target)?.collect();
    let missing = values.iter().filter(|v| v.is_null()).count();
    let targets_missing_rate = missing as f64 / values.len() as f64;

    let counts = value_counts(data, target)?;
    let outcome = chi2_contingency(&contingency_table(reference_counts, &counts));

    let present: Vec<&serde_json::Value> = values.into_iter().filter(|v| !v.is_null()).collect();
    let metric_target_drift = if counts.len() > 2 {
        tracing::warn!(
            chunk = %chunk.key,
            unique_values = counts.len(),
            "the target column contains more than 2 unique values; metric_target_drift is set to NaN"
        );
        f64::NAN
    } else if present.iter().any(|v| v.is_string()) {
        tracing::warn!(
            chunk = %chunk.key,
            "the target column contains non-numerical values; metric_target_drift is set to NaN"
        );
        f64::NAN
    } else {
        let numeric: Vec<f64> = present
            .iter()
            .filter_map(|v| v.as_f64().or_else(|| v.as_bool().map(f64::from)))
            .collect();
        mean(&numeric)
    };

    let alert = outcome.p_value < ALERT_THRESHOLD_P_VALUE;
    Ok(TargetDriftRow {
        chunk: ChunkSummary::from(chunk),
        targets_missing_rate,
        metric_target_drift,
        statistical_target_drift: outcome.statistic,
        p_value: outcome.p_value,
        thresholds: ALERT_THRESHOLD_P_VALUE,
        alert,
        significant: alert,
    })
}

impl Calculator for TargetDistributionCalculator {
    type Output = TargetDistributionResult;

    fn fit(&mut self, reference: &DataBatch) -> Result<(), DriftError> {
        self.check(reference)?;
        let counts = value_counts(reference.as_slice(), &self.config.target_column_name)?;
        let reference_results = self.rows(&counts, reference)?;
        tracing::info!(
            rows = reference.row_count(),
            classes = counts.len(),
            "fitted target distribution calculator"
        );
        self.fitted = Some(FittedTargets {
            counts,
            reference_results: reference_results.into(),
        });
        Ok(())
    }

    fn calculate(&self, data: &DataBatch) -> Result<TargetDistributionResult, DriftError> {
        let fitted = self.fitted.as_ref().ok_or_else(|| {
            DriftError::not_fitted("no reference data known. Did you fit the calculator first?")
        })?;
        self.check(data)?;
        let rows = self.rows(&fitted.counts, data)?;
        tracing::info!(
            chunks = rows.len(),
            alerts = rows.iter().filter(|r| r.alert).count(),
            "calculated target distribution drift"
        );
        Ok(TargetDistributionResult {
            rows,
            reference: Arc::clone(&fitted.reference_results),
        })
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetDriftRow {
    #[serde(flatten)]
    pub chunk: ChunkSummary,
    pub targets_missing_rate: f64,
    /// Mean of a binary numeric target; NaN otherwise.
    pub metric_target_drift: f64,
    /// Chi-squared statistic of the chunk's target counts against the reference.
    pub statistical_target_drift: f64,
    pub p_value: f64,
    pub thresholds: f64,
    pub alert: bool,
    pub significant: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetDistributionResult {
    rows: Vec<TargetDriftRow>,
    #[serde(skip)]
    reference: Arc<[TargetDriftRow]>,
}

impl TargetDistributionResult {
    pub const CALCULATOR_NAME: &'static str = "target_distribution";

    pub fn rows(&self) -> &[TargetDriftRow] {
        &self.rows
    }

    pub fn reference_rows(&self) -> &[TargetDriftRow] {
        &self.reference
    }
}

impl CalculatorResult for TargetDistributionResult {
    fn calculator_name(&self) -> &'static str {
        Self::CALCULATOR_NAME
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn to_json(&self) -> Result<serde_json::Value, DriftError> {
        Ok(serde_json::to_value(&self.rows)?)
    }
}
