//! Multivariate drift detection through data reconstruction error.
//!
//! Reference features are imputed, frequency-encoded and standardized, then
//! compressed with PCA. A chunk whose joint feature structure departs from the
//! reference reconstructs poorly, so its mean reconstruction error rises above
//! the band observed over reference chunks.

use crate::algorithms::pca::PcaModel;
use crate::chunk::{Chunk, Chunker, Period, minimum_chunk_size};
use crate::config::CalculatorConfig;
use crate::data::schema::{FeatureSpec, split_features_by_type, validate_feature_kinds};
use crate::data::source::DataBatch;
use crate::data::validate::validate_batch;
use crate::drift::plots::{PlotKind, PlotPoint, StepPlot};
use crate::drift::reconstruction::reconstruction_error;
use crate::drift::thresholds::AlertThresholds;
use crate::drift::{Calculator, CalculatorResult, ChunkSummary};
use crate::error::DriftError;
use crate::features::imputer::SimpleImputer;
use crate::features::pipeline::FeaturePipeline;
use serde::Serialize;
use std::sync::Arc;

/// Everything learned by [`DataReconstructionDriftCalculator::fit`].
#[derive(Debug)]
struct FittedArtifacts {
    pipeline: FeaturePipeline,
    model: PcaModel,
    thresholds: AlertThresholds,
    reference_results: Arc<[ReconstructionDriftRow]>,
}

#[derive(Debug)]
enum CalculatorState {
    Unfitted,
    Fitted(Box<FittedArtifacts>),
}

/// Detects drift in the joint distribution of a set of features.
#[derive(Debug)]
pub struct DataReconstructionDriftCalculator {
    config: CalculatorConfig,
    chunker: Box<dyn Chunker>,
    categorical_imputer: SimpleImputer,
    continuous_imputer: SimpleImputer,
    state: CalculatorState,
}

impl DataReconstructionDriftCalculator {
    /// Create an unfitted calculator. Invalid settings fail here, before any data is seen.
    pub fn new(config: CalculatorConfig) -> Result<Self, DriftError> {
        let chunking = config.validate()?;
        let categorical_imputer =
            SimpleImputer::for_categorical(config.imputer_categorical.clone())?;
        let continuous_imputer = SimpleImputer::for_continuous(config.imputer_continuous.clone());
        Ok(Self {
            chunker: chunking.chunker(),
            config,
            categorical_imputer,
            continuous_imputer,
            state: CalculatorState::Unfitted,
        })
    }

    /// Replace the chunker derived from the config.
    pub fn with_chunker(mut self, chunker: Box<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn config(&self) -> &CalculatorConfig {
        &self.config
    }

    pub fn thresholds(&self) -> Option<AlertThresholds> {
        self.artifacts().map(|a| a.thresholds)
    }

    /// Feature kinds frozen at fit time.
    pub fn features(&self) -> Option<&[FeatureSpec]> {
        self.artifacts().map(|a| a.pipeline.features())
    }

    pub fn model(&self) -> Option<&PcaModel> {
        self.artifacts().map(|a| &a.model)
    }

    /// Result rows of the reference data, computed during fit.
    pub fn reference_results(&self) -> Option<&[ReconstructionDriftRow]> {
        self.artifacts().map(|a| &a.reference_results[..])
    }

    fn artifacts(&self) -> Option<&FittedArtifacts> {
        match &self.state {
            CalculatorState::Fitted(artifacts) => Some(artifacts),
            CalculatorState::Unfitted => None,
        }
    }

    fn minimum_chunk_size(&self) -> usize {
        minimum_chunk_size(self.config.feature_column_names.len())
    }

    /// Chunk `data` and score each chunk. Shared by fit and calculate.
    fn chunk_errors(
        &self,
        pipeline: &FeaturePipeline,
        model: &PcaModel,
        data: &DataBatch,
    ) -> Result<(Vec<Chunk>, Vec<f64>), DriftError> {
        let chunks = self.chunker.split(
            data,
            &self.config.feature_column_names,
            self.minimum_chunk_size(),
            &self.config.timestamp_column_name,
            Period::Analysis,
        )?;
        let errors = chunks
            .iter()
            .map(|chunk| reconstruction_error(pipeline, model, data.slice(chunk.rows())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((chunks, errors))
    }
}

fn build_rows(
    chunks: &[Chunk],
    errors: &[f64],
    thresholds: AlertThresholds,
) -> Vec<ReconstructionDriftRow> {
    chunks
        .iter()
        .zip(errors)
        .map(|(chunk, &error)| ReconstructionDriftRow {
            chunk: ChunkSummary::from(chunk),
            reconstruction_error: error,
            lower_threshold: thresholds.lower,
            upper_threshold: thresholds.upper,
            alert: thresholds.is_alert(error),
        })
        .collect()
}

impl Calculator for DataReconstructionDriftCalculator {
    type Output = ReconstructionDriftResult;

    fn fit(&mut self, reference: &DataBatch) -> Result<(), DriftError> {
        validate_batch(reference, &self.config.feature_column_names)?;
        let features = split_features_by_type(reference.as_slice(), &self.config.feature_column_names)?;

        let (pipeline, standardized) = FeaturePipeline::fit(
            features,
            self.categorical_imputer.clone(),
            self.continuous_imputer.clone(),
            reference.as_slice(),
        )?;
        let model = PcaModel::fit(&standardized, self.config.n_components)?;
        drop(standardized);

        let (chunks, errors) = self.chunk_errors(&pipeline, &model, reference)?;
        let thresholds = AlertThresholds::from_reference(&errors);
        let reference_results = build_rows(&chunks, &errors, thresholds);

        tracing::info!(
            rows = reference.row_count(),
            features = pipeline.n_features(),
            components = model.n_components(),
            reference_chunks = chunks.len(),
            lower_threshold = thresholds.lower,
            upper_threshold = thresholds.upper,
            "fitted data reconstruction drift calculator"
        );

        self.state = CalculatorState::Fitted(Box::new(FittedArtifacts {
            pipeline,
            model,
            thresholds,
            reference_results: reference_results.into(),
        }));
        Ok(())
    }

    fn calculate(&self, data: &DataBatch) -> Result<ReconstructionDriftResult, DriftError> {
        let artifacts = self.artifacts().ok_or_else(|| {
            DriftError::not_fitted(
                "no fitted artifacts or thresholds available. Did you fit the calculator first?",
            )
        })?;
        validate_batch(data, &self.config.feature_column_names)?;
        validate_feature_kinds(data.as_slice(), artifacts.pipeline.features())?;

        let (chunks, errors) = self.chunk_errors(&artifacts.pipeline, &artifacts.model, data)?;
        let rows = build_rows(&chunks, &errors, artifacts.thresholds);

        tracing::info!(
            chunks = rows.len(),
            alerts = rows.iter().filter(|r| r.alert).count(),
            "calculated data reconstruction drift"
        );

        Ok(ReconstructionDriftResult {
            rows,
            reference: Arc::clone(&artifacts.reference_results),
        })
    }

    fn is_fitted(&self) -> bool {
        matches!(self.state, CalculatorState::Fitted(_))
    }
}

/// One result row per chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconstructionDriftRow {
    #[serde(flatten)]
    pub chunk: ChunkSummary,
    pub reconstruction_error: f64,
    pub lower_threshold: f64,
    pub upper_threshold: f64,
    pub alert: bool,
}

impl ReconstructionDriftRow {
    fn plot_point(&self) -> PlotPoint {
        PlotPoint {
            key: self.chunk.key.clone(),
            start_date: self.chunk.start_date,
            end_date: self.chunk.end_date,
            period: self.chunk.period,
            value: self.reconstruction_error,
            alert: self.alert,
        }
    }
}

/// Output of [`DataReconstructionDriftCalculator::calculate`].
#[derive(Debug, Clone, Serialize)]
pub struct ReconstructionDriftResult {
    rows: Vec<ReconstructionDriftRow>,
    #[serde(skip)]
    reference: Arc<[ReconstructionDriftRow]>,
}

impl ReconstructionDriftResult {
    pub const CALCULATOR_NAME: &'static str = "multivariate_data_reconstruction_feature_drift";

    pub fn rows(&self) -> &[ReconstructionDriftRow] {
        &self.rows
    }

    /// Reference rows of the calculator that produced this result.
    pub fn reference_rows(&self) -> &[ReconstructionDriftRow] {
        &self.reference
    }

    pub fn alerts(&self) -> impl Iterator<Item = &ReconstructionDriftRow> {
        self.rows.iter().filter(|r| r.alert)
    }
}

impl CalculatorResult for ReconstructionDriftResult {
    fn calculator_name(&self) -> &'static str {
        Self::CALCULATOR_NAME
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn to_json(&self) -> Result<serde_json::Value, DriftError> {
        Ok(serde_json::to_value(&self.rows)?)
    }

    fn plot(&self, kind: PlotKind, plot_reference: bool) -> Result<StepPlot, DriftError> {
        match kind {
            PlotKind::Drift => {
                let thresholds = self
                    .rows
                    .first()
                    .or(self.reference.first())
                    .map(|r| (r.lower_threshold, r.upper_threshold))
                    .unwrap_or((f64::NAN, f64::NAN));
                let reference = if plot_reference {
                    self.reference.iter().map(ReconstructionDriftRow::plot_point).collect()
                } else {
                    Vec::new()
                };
                Ok(StepPlot::new(
                    "Data Reconstruction Drift",
                    "Reconstruction Error",
                    "reconstruction_error",
                    thresholds,
                    reference,
                    self.rows.iter().map(ReconstructionDriftRow::plot_point).collect(),
                ))
            }
        }
    }
}
