//! End-to-end tests of the data reconstruction drift calculator.

mod common;

use common::{Synthetic, feature_names};
use driftwatch_core::algorithms::NComponents;
use driftwatch_core::chunk::Chunker;
use driftwatch_core::data::{CsvSource, DataSource};
use driftwatch_core::{
    Calculator, CalculatorConfig, CalculatorResult, DataReconstructionDriftCalculator, DriftError,
    Period, PlotKind,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn fitted(reference: &Synthetic) -> DataReconstructionDriftCalculator {
    let config = CalculatorConfig::new(feature_names(), "timestamp");
    let mut calc = DataReconstructionDriftCalculator::new(config).unwrap();
    calc.fit(&reference.to_batch()).unwrap();
    calc
}

#[test]
fn reference_data_stays_within_thresholds() {
    let reference = Synthetic::generate(1000, 7);
    let calc = fitted(&reference);
    let result = calc.calculate(&reference.to_batch()).unwrap();

    assert_eq!(result.len(), 10);
    for row in result.rows() {
        assert!(row.reconstruction_error < row.upper_threshold);
        assert!(row.reconstruction_error > row.lower_threshold);
        assert!(!row.alert);
    }
}

#[test]
fn reference_error_is_near_zero_when_all_variance_is_kept() {
    let reference = Synthetic::generate(1000, 11);
    let mut config = CalculatorConfig::new(feature_names(), "timestamp");
    config.n_components = NComponents::Count(2);
    let mut calc = DataReconstructionDriftCalculator::new(config).unwrap();
    calc.fit(&reference.to_batch()).unwrap();

    let result = calc.calculate(&reference.to_batch()).unwrap();
    for row in result.rows() {
        assert!(row.reconstruction_error < 1e-6);
        assert!(!row.alert);
    }
}

#[test]
fn breaking_feature_correlation_raises_alerts() {
    let reference = Synthetic::generate(1000, 7);
    let calc = fitted(&reference);
    let analysis = Synthetic::generate(1000, 8).shuffle_x2(99);
    let result = calc.calculate(&analysis.to_batch()).unwrap();

    assert!(result.alerts().count() >= 1);
    let thresholds = calc.thresholds().unwrap();
    let mean_error: f64 =
        result.rows().iter().map(|r| r.reconstruction_error).sum::<f64>() / result.len() as f64;
    assert!(mean_error > thresholds.upper);
}

#[test]
fn calculating_reference_reproduces_snapshot() {
    let reference = Synthetic::generate(1000, 21);
    let batch = reference.to_batch_in("reference");
    let config = CalculatorConfig::new(feature_names(), "timestamp");
    let mut calc = DataReconstructionDriftCalculator::new(config).unwrap();
    calc.fit(&batch).unwrap();

    let result = calc.calculate(&batch).unwrap();
    assert_eq!(result.rows(), calc.reference_results().unwrap());
    assert!(result.rows().iter().all(|r| r.chunk.period == Period::Reference));
}

#[test]
fn calculating_untagged_reference_reproduces_snapshot() {
    let batch = Synthetic::generate(1000, 21).to_batch();
    assert!(batch.column_index("period").is_none());
    let config = CalculatorConfig::new(feature_names(), "timestamp");
    let mut calc = DataReconstructionDriftCalculator::new(config).unwrap();
    calc.fit(&batch).unwrap();

    let result = calc.calculate(&batch).unwrap();
    assert_eq!(result.len(), 10);
    assert_eq!(result.rows(), calc.reference_results().unwrap());
}

#[test]
fn refitting_is_deterministic() {
    let reference = Synthetic::generate(600, 3);
    let a = fitted(&reference);
    let b = fitted(&reference);
    assert_eq!(a.thresholds(), b.thresholds());
    assert_eq!(a.model(), b.model());
}

#[test]
fn transition_chunk_is_reported_as_analysis() {
    let data = Synthetic::generate(1000, 5);
    let periods = (0..1000)
        .map(|i| json!(if i < 550 { "reference" } else { "analysis" }))
        .collect();
    let batch = data.to_batch().with_column("period", periods).unwrap();

    let calc = fitted(&Synthetic::generate(1000, 4));
    let result = calc.calculate(&batch).unwrap();
    let periods: Vec<Period> = result.rows().iter().map(|r| r.chunk.period).collect();
    assert_eq!(&periods[..5], &[Period::Reference; 5]);
    assert_eq!(&periods[5..], &[Period::Analysis; 5]);
}

#[test]
fn rows_follow_chunker_output() {
    let reference = Synthetic::generate(900, 13);
    let mut config = CalculatorConfig::new(feature_names(), "timestamp");
    config.chunking.chunk_period = Some(driftwatch_core::ChunkPeriod::Week);
    let mut calc = DataReconstructionDriftCalculator::new(config.clone()).unwrap();
    calc.fit(&reference.to_batch()).unwrap();

    let analysis = Synthetic::generate(700, 14).to_batch();
    let result = calc.calculate(&analysis).unwrap();
    let chunks = config
        .validate()
        .unwrap()
        .chunker()
        .split(&analysis, &feature_names(), 0, "timestamp", Period::Analysis)
        .unwrap();

    assert_eq!(result.len(), chunks.len());
    for (row, chunk) in result.rows().iter().zip(&chunks) {
        assert_eq!(row.chunk.key, chunk.key);
        assert_eq!(row.chunk.start_index, chunk.start_index);
    }
    assert!(result.rows().windows(2).all(|w| w[0].chunk.end_date <= w[1].chunk.start_date));
}

#[test]
fn empty_and_incomplete_data_are_rejected() {
    let config = CalculatorConfig::new(feature_names(), "timestamp");
    let mut calc = DataReconstructionDriftCalculator::new(config).unwrap();

    let empty = driftwatch_core::DataBatch::new(
        vec!["timestamp".into(), "x1".into(), "x2".into(), "x3".into()],
        vec![],
    )
    .unwrap();
    assert!(matches!(calc.fit(&empty), Err(DriftError::InvalidInput(_))));

    let data = Synthetic::generate(200, 1).to_batch();
    let mut partial = data.clone();
    let x3 = partial.column_index("x3").unwrap();
    partial.columns[x3] = "other".into();
    let err = calc.fit(&partial).unwrap_err();
    assert!(err.to_string().contains("x3"));
    assert!(!calc.is_fitted());

    calc.fit(&data).unwrap();
    assert!(matches!(calc.calculate(&empty), Err(DriftError::InvalidInput(_))));
    let err = calc.calculate(&partial).unwrap_err();
    assert!(matches!(err, DriftError::InvalidInput(_)));
    assert!(err.to_string().contains("x3"));
}

#[test]
fn missing_values_are_imputed() {
    let reference = Synthetic::generate(1000, 17);
    let calc = fitted(&reference);

    let mut batch = Synthetic::generate(500, 18).to_batch();
    let x1 = batch.column_index("x1").unwrap();
    for row in batch.rows.iter_mut().step_by(7) {
        row[x1] = serde_json::Value::Null;
    }
    let result = calc.calculate(&batch).unwrap();
    assert!(result.rows().iter().all(|r| r.reconstruction_error.is_finite()));
}

#[test]
fn unknown_plot_kind_is_unsupported() {
    let reference = Synthetic::generate(400, 2);
    let calc = fitted(&reference);
    let result = calc.calculate(&reference.to_batch()).unwrap();

    let err = result.plot_named("not_a_real_kind", false).unwrap_err();
    assert!(matches!(err, DriftError::UnsupportedOperation(_)));
    assert!(err.to_string().contains("not_a_real_kind"));

    let plot = result.plot(PlotKind::Drift, false).unwrap();
    assert_eq!(plot.points.len(), result.len());
}

#[tokio::test]
async fn csv_round_trip_through_calculator() {
    let dir = tempfile::tempdir().unwrap();
    let reference = Synthetic::generate(1000, 31);
    let analysis = Synthetic::generate(1000, 32).shuffle_x2(5);
    let reference_path = dir.path().join("reference.csv");
    let analysis_path = dir.path().join("analysis.csv");
    std::fs::write(&reference_path, reference.to_csv()).unwrap();
    std::fs::write(&analysis_path, analysis.to_csv()).unwrap();

    let load = |path| CsvSource {
        path,
        delimiter: ',',
    };
    let reference_batch = load(reference_path).load(None).await.unwrap();
    let analysis_batch = load(analysis_path).load(None).await.unwrap();

    let config = CalculatorConfig::new(feature_names(), "timestamp");
    let mut calc = DataReconstructionDriftCalculator::new(config).unwrap();
    calc.fit(&reference_batch).unwrap();

    let in_memory = fitted(&reference);
    assert_eq!(calc.thresholds(), in_memory.thresholds());

    let result = calc.calculate(&analysis_batch).unwrap();
    assert!(result.alerts().count() >= 1);
}
