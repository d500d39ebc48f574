//! The fitted preprocessing chain: impute, frequency-encode, standardize.

use crate::data::schema::{FeatureKind, FeatureSpec, names_of_kind};
use crate::data::source::BatchSlice;
use crate::error::DriftError;
use crate::features::encoder::{FrequencyEncoder, category_key};
use crate::features::imputer::SimpleImputer;
use crate::features::scaler::StandardScaler;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Preprocessing artifacts learned from reference data.
///
/// Transforms are applied column by column into a single staging matrix;
/// intermediate imputed or encoded tables are never materialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePipeline {
    features: Vec<FeatureSpec>,
    categorical_imputer: SimpleImputer,
    continuous_imputer: SimpleImputer,
    encoder: FrequencyEncoder,
    scaler: StandardScaler,
}

impl FeaturePipeline {
    /// Fit every stage on `reference` and return the standardized reference matrix with it.
    pub fn fit(
        features: Vec<FeatureSpec>,
        mut categorical_imputer: SimpleImputer,
        mut continuous_imputer: SimpleImputer,
        reference: BatchSlice<'_>,
    ) -> Result<(Self, Array2<f64>), DriftError> {
        check_input(reference, &features)?;

        categorical_imputer.fit(
            reference,
            &names_of_kind(&features, FeatureKind::Categorical),
        )?;
        continuous_imputer.fit(reference, &names_of_kind(&features, FeatureKind::Continuous))?;

        let mut encoder = FrequencyEncoder::new();
        let mut staging = Array2::<f64>::zeros((reference.row_count(), features.len()));
        for (j, feature) in features.iter().enumerate() {
            let imputer = match feature.kind {
                FeatureKind::Categorical => &categorical_imputer,
                FeatureKind::Continuous => &continuous_imputer,
            };
            let keys = reference
                .column_by_name(&feature.name)?
                .map(|value| imputer.impute(&feature.name, value).map(category_key))
                .collect::<Result<Vec<_>, _>>()?;
            encoder.fit_column(&feature.name, keys.iter().cloned());
            for (cell, key) in staging.column_mut(j).iter_mut().zip(&keys) {
                *cell = encoder.encode(&feature.name, key);
            }
        }

        let scaler = StandardScaler::fit(&staging);
        scaler.transform_inplace(&mut staging);

        tracing::debug!(
            rows = reference.row_count(),
            features = features.len(),
            "fitted preprocessing pipeline"
        );

        let pipeline = Self {
            features,
            categorical_imputer,
            continuous_imputer,
            encoder,
            scaler,
        };
        Ok((pipeline, staging))
    }

    /// Apply the fitted transforms to `data`, yielding one standardized row per input row.
    pub fn transform(&self, data: BatchSlice<'_>) -> Result<Array2<f64>, DriftError> {
        check_input(data, &self.features)?;

        let mut staging = Array2::<f64>::zeros((data.row_count(), self.features.len()));
        for (j, feature) in self.features.iter().enumerate() {
            let imputer = self.imputer_for(feature.kind);
            for (cell, value) in staging
                .column_mut(j)
                .iter_mut()
                .zip(data.column_by_name(&feature.name)?)
            {
                let filled = imputer.impute(&feature.name, value)?;
                *cell = self.encoder.encode(&feature.name, &category_key(filled));
            }
        }
        self.scaler.transform_inplace(&mut staging);
        Ok(staging)
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    fn imputer_for(&self, kind: FeatureKind) -> &SimpleImputer {
        match kind {
            FeatureKind::Categorical => &self.categorical_imputer,
            FeatureKind::Continuous => &self.continuous_imputer,
        }
    }
}

fn check_input(data: BatchSlice<'_>, features: &[FeatureSpec]) -> Result<(), DriftError> {
    if data.is_empty() {
        return Err(DriftError::empty_data());
    }
    let missing: Vec<String> = features
        .iter()
        .filter(|f| data.column_index(&f.name).is_none())
        .map(|f| f.name.clone())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DriftError::missing_columns(&missing))
    }
}
