//! Per-feature drift using two-sample hypothesis tests against the reference data.
//!
//! Continuous features use the Kolmogorov-Smirnov test, categorical features
//! the chi-squared test of independence on value counts. Missing values are
//! left out of both tests.

use crate::algorithms::stats::{TestOutcome, chi2_contingency, ks_2samp, round_to};
use crate::chunk::{Chunker, Period, minimum_chunk_size};
use crate::config::UnivariateConfig;
use crate::data::schema::{FeatureKind, FeatureSpec, split_features_by_type, validate_feature_kinds};
use crate::data::source::{BatchSlice, DataBatch};
use crate::data::validate::validate_batch;
use crate::drift::{ALERT_THRESHOLD_P_VALUE, Calculator, CalculatorResult, ChunkSummary};
use crate::error::DriftError;
use crate::features::encoder::category_key;
use serde::Serialize;
use std::collections::BTreeMap;

/// The hypothesis test applied to a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticalTest {
    /// Two-sample Kolmogorov-Smirnov; the statistic is `dstat`.
    KolmogorovSmirnov,
    /// Chi-squared contingency; the statistic is `chi2`.
    ChiSquared,
}

impl StatisticalTest {
    pub fn statistic_name(self) -> &'static str {
        match self {
            Self::KolmogorovSmirnov => "dstat",
            Self::ChiSquared => "chi2",
        }
    }
}

/// Reference sample retained for one feature.
#[derive(Debug, Clone)]
enum ReferenceSample {
    Continuous(Vec<f64>),
    Categorical(BTreeMap<String, f64>),
}

impl ReferenceSample {
    fn from_column(kind: FeatureKind, data: BatchSlice<'_>, column: &str) -> Result<Self, DriftError> {
        Ok(match kind {
            FeatureKind::Continuous => Self::Continuous(numeric_values(data, column)?),
            FeatureKind::Categorical => Self::Categorical(value_counts(data, column)?),
        })
    }

    fn test(&self, data: BatchSlice<'_>, column: &str) -> Result<(StatisticalTest, TestOutcome), DriftError> {
        Ok(match self {
            Self::Continuous(reference) => (
                StatisticalTest::KolmogorovSmirnov,
                ks_2samp(reference, &numeric_values(data, column)?),
            ),
            Self::Categorical(reference) => (
                StatisticalTest::ChiSquared,
                chi2_contingency(&contingency_table(reference, &value_counts(data, column)?)),
            ),
        })
    }
}

fn numeric_values(data: BatchSlice<'_>, column: &str) -> Result<Vec<f64>, DriftError> {
    Ok(data.column_by_name(column)?.filter_map(serde_json::Value::as_f64).collect())
}

/// Counts of non-missing values keyed by [`category_key`].
pub(crate) fn value_counts(data: BatchSlice<'_>, column: &str) -> Result<BTreeMap<String, f64>, DriftError> {
    let mut counts = BTreeMap::new();
    for value in data.column_by_name(column)?.filter(|v| !v.is_null()) {
        *counts.entry(category_key(value)).or_insert(0.0) += 1.0;
    }
    Ok(counts)
}

/// Two-column table over the union of categories: reference counts, then current counts.
pub(crate) fn contingency_table(
    reference: &BTreeMap<String, f64>,
    current: &BTreeMap<String, f64>,
) -> Vec<Vec<f64>> {
    let mut categories: Vec<&String> = reference.keys().chain(current.keys()).collect();
    categories.sort();
    categories.dedup();
    categories
        .into_iter()
        .map(|c| {
            vec![
                reference.get(c).copied().unwrap_or(0.0),
                current.get(c).copied().unwrap_or(0.0),
            ]
        })
        .collect()
}

#[derive(Debug)]
struct FittedReference {
    features: Vec<FeatureSpec>,
    samples: Vec<ReferenceSample>,
}

/// Runs one univariate test per feature and chunk.
#[derive(Debug)]
pub struct UnivariateStatisticalDriftCalculator {
    config: UnivariateConfig,
    chunker: Box<dyn Chunker>,
    reference: Option<FittedReference>,
}

impl UnivariateStatisticalDriftCalculator {
    pub fn new(config: UnivariateConfig) -> Result<Self, DriftError> {
        let chunking = config.validate()?;
        Ok(Self {
            chunker: chunking.chunker(),
            config,
            reference: None,
        })
    }

    pub fn with_chunker(mut self, chunker: Box<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn config(&self) -> &UnivariateConfig {
        &self.config
    }
}

impl Calculator for UnivariateStatisticalDriftCalculator {
    type Output = UnivariateDriftResult;

    fn fit(&mut self, reference: &DataBatch) -> Result<(), DriftError> {
        validate_batch(reference, &self.config.feature_column_names)?;
        let data = reference.as_slice();
        let features = split_features_by_type(data, &self.config.feature_column_names)?;
        let samples = features
            .iter()
            .map(|spec| ReferenceSample::from_column(spec.kind, data, &spec.name))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            rows = reference.row_count(),
            features = features.len(),
            "fitted univariate statistical drift calculator"
        );
        self.reference = Some(FittedReference { features, samples });
        Ok(())
    }

    fn calculate(&self, data: &DataBatch) -> Result<UnivariateDriftResult, DriftError> {
        let reference = self.reference.as_ref().ok_or_else(|| {
            DriftError::not_fitted("no reference data known. Did you fit the calculator first?")
        })?;
        validate_batch(data, &self.config.feature_column_names)?;
        validate_feature_kinds(data.as_slice(), &reference.features)?;

        let chunks = self.chunker.split(
            data,
            &self.config.feature_column_names,
            minimum_chunk_size(self.config.feature_column_names.len()),
            &self.config.timestamp_column_name,
            Period::Analysis,
        )?;

        let mut rows = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let slice = data.slice(chunk.rows());
            let features = reference
                .features
                .iter()
                .zip(&reference.samples)
                .map(|(spec, sample)| {
                    let (test, outcome) = sample.test(slice, &spec.name)?;
                    Ok(FeatureDrift {
                        feature: spec.name.clone(),
                        test,
                        statistic: outcome.statistic,
                        p_value: round_to(outcome.p_value, 3),
                        alert: outcome.p_value < ALERT_THRESHOLD_P_VALUE,
                    })
                })
                .collect::<Result<Vec<_>, DriftError>>()?;
            rows.push(UnivariateDriftRow {
                chunk: ChunkSummary::from(chunk),
                features,
            });
        }

        tracing::info!(
            chunks = rows.len(),
            alerts = rows.iter().flat_map(|r| &r.features).filter(|f| f.alert).count(),
            "calculated univariate statistical drift"
        );
        Ok(UnivariateDriftResult {
            feature_names: self.config.feature_column_names.clone(),
            rows,
        })
    }

    fn is_fitted(&self) -> bool {
        self.reference.is_some()
    }
}

/// Test outcome for one feature in one chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureDrift {
    pub feature: String,
    pub test: StatisticalTest,
    pub statistic: f64,
    /// Rounded to three decimals.
    pub p_value: f64,
    pub alert: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnivariateDriftRow {
    #[serde(flatten)]
    pub chunk: ChunkSummary,
    pub features: Vec<FeatureDrift>,
}

impl UnivariateDriftRow {
    pub fn feature(&self, name: &str) -> Option<&FeatureDrift> {
        self.features.iter().find(|f| f.feature == name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnivariateDriftResult {
    feature_names: Vec<String>,
    rows: Vec<UnivariateDriftRow>,
}

impl UnivariateDriftResult {
    pub const CALCULATOR_NAME: &'static str = "univariate_statistical_feature_drift";

    pub fn new(feature_names: Vec<String>, rows: Vec<UnivariateDriftRow>) -> Self {
        Self { feature_names, rows }
    }

    pub fn rows(&self) -> &[UnivariateDriftRow] {
        &self.rows
    }

    /// Feature names in configuration order.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

impl CalculatorResult for UnivariateDriftResult {
    fn calculator_name(&self) -> &'static str {
        Self::CALCULATOR_NAME
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    /// Flat records: one `{feature}_{statistic}`, `{feature}_p_value` and
    /// `{feature}_alert` column per feature.
    fn to_json(&self) -> Result<serde_json::Value, DriftError> {
        let records = self
            .rows
            .iter()
            .map(|row| {
                let mut record = match serde_json::to_value(&row.chunk)? {
                    serde_json::Value::Object(map) => map,
                    _ => serde_json::Map::new(),
                };
                for f in &row.features {
                    record.insert(
                        format!("{}_{}", f.feature, f.test.statistic_name()),
                        serde_json::to_value(f.statistic)?,
                    );
                    record.insert(format!("{}_p_value", f.feature), serde_json::to_value(f.p_value)?);
                    record.insert(format!("{}_alert", f.feature), serde_json::Value::Bool(f.alert));
                }
                Ok(serde_json::Value::Object(record))
            })
            .collect::<Result<Vec<_>, DriftError>>()?;
        Ok(serde_json::Value::Array(records))
    }
}
