//! Reconstruction error of a batch through the fitted pipeline and reduction model.

use crate::algorithms::pca::PcaModel;
use crate::data::source::BatchSlice;
use crate::error::DriftError;
use crate::features::pipeline::FeaturePipeline;
use ndarray::{Array1, Array2, Axis};

/// Mean row-wise Euclidean distance between the standardized rows of `data`
/// and their reconstruction through `model`.
///
/// Fails with a data-validation error when `data` is empty or lacks a feature column.
pub fn reconstruction_error(
    pipeline: &FeaturePipeline,
    model: &PcaModel,
    data: BatchSlice<'_>,
) -> Result<f64, DriftError> {
    let standardized = pipeline.transform(data)?;
    let distances = row_distances(model, &standardized);
    distances
        .mean()
        .ok_or_else(DriftError::empty_data)
}

/// Euclidean distance of every row of `x` to its reconstruction.
pub fn row_distances(model: &PcaModel, x: &Array2<f64>) -> Array1<f64> {
    let reconstructed = model.reconstruct(&model.project(x));
    (x - &reconstructed)
        .mapv(|d| d * d)
        .sum_axis(Axis(1))
        .mapv(f64::sqrt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::pca::NComponents;
    use crate::data::schema::split_features_by_type;
    use crate::data::source::DataBatch;
    use crate::features::imputer::SimpleImputer;
    use ndarray::array;
    use serde_json::json;

    fn batch() -> DataBatch {
        DataBatch::from_columns(vec![
            ("x".into(), (0..12).map(|i| json!(f64::from(i % 5))).collect()),
            ("y".into(), (0..12).map(|i| json!(f64::from(i % 5) * 2.0 + 1.0)).collect()),
            (
                "c".into(),
                (0..12).map(|i| json!(if i % 3 == 0 { "a" } else { "b" })).collect(),
            ),
        ])
        .unwrap()
    }

    fn fitted(data: &DataBatch) -> (FeaturePipeline, PcaModel) {
        let features =
            split_features_by_type(data.as_slice(), &["x".into(), "y".into(), "c".into()]).unwrap();
        let (pipeline, standardized) = FeaturePipeline::fit(
            features,
            SimpleImputer::for_categorical(None).unwrap(),
            SimpleImputer::for_continuous(None),
            data.as_slice(),
        )
        .unwrap();
        let model = PcaModel::fit(&standardized, NComponents::Count(1)).unwrap();
        (pipeline, model)
    }

    #[test]
    fn test_single_row_error_is_finite() {
        let data = batch();
        let (pipeline, model) = fitted(&data);
        let error = reconstruction_error(&pipeline, &model, data.slice(3..4)).unwrap();
        assert!(error.is_finite());
        assert!(error >= 0.0);
    }

    #[test]
    fn test_error_is_mean_of_row_distances() {
        let data = batch();
        let (pipeline, model) = fitted(&data);
        let distances = row_distances(&model, &pipeline.transform(data.as_slice()).unwrap());
        let error = reconstruction_error(&pipeline, &model, data.as_slice()).unwrap();
        assert!((error - distances.sum() / 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let data = batch();
        let (pipeline, model) = fitted(&data);
        let err = reconstruction_error(&pipeline, &model, data.slice(0..0)).unwrap_err();
        assert!(matches!(err, DriftError::InvalidInput(_)));
    }

    #[test]
    fn test_points_on_subspace_have_zero_distance() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let model = PcaModel::fit(&x, NComponents::Count(1)).unwrap();
        let d = row_distances(&model, &x);
        assert!(d.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn test_off_subspace_point_distance() {
        let x = array![[-1.0, 0.0], [0.0, 0.0], [1.0, 0.0], [0.0, 0.0]];
        let model = PcaModel::fit(&x, NComponents::Count(1)).unwrap();
        let probe = array![[0.5, 2.0]];
        let d = row_distances(&model, &probe);
        assert!((d[0] - 2.0).abs() < 1e-9);
    }
}
